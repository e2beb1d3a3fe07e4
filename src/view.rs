//! Bounded, duplicate-free collection of [`PeerState`] with O(1) membership
//! and random sampling, used for both the active and the passive view.
//!
//! Deterministic ordering is irrelevant (see `spec.md` §4.1); this keeps an
//! index by identifier alongside a flat `Vec` so membership checks stay
//! O(1) while sampling stays O(n).

use {
  crate::peer::{PeerId, PeerState},
  rand::{seq::SliceRandom, Rng},
  std::collections::HashMap,
};

#[derive(Debug)]
pub struct View {
  capacity: usize,
  entries: Vec<PeerState>,
  index: HashMap<PeerId, usize>,
}

impl View {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      entries: Vec::with_capacity(capacity),
      index: HashMap::with_capacity(capacity),
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn size(&self) -> usize {
    self.entries.len()
  }

  pub fn is_full(&self) -> bool {
    self.entries.len() >= self.capacity
  }

  pub fn contains(&self, id: &PeerId) -> bool {
    self.index.contains_key(id)
  }

  pub fn get(&self, id: &PeerId) -> Option<&PeerState> {
    self.index.get(id).map(|&i| &self.entries[i])
  }

  pub fn get_mut(&mut self, id: &PeerId) -> Option<&mut PeerState> {
    let i = *self.index.get(id)?;
    Some(&mut self.entries[i])
  }

  pub fn ids(&self) -> impl Iterator<Item = &PeerId> {
    self.entries.iter().map(|p| &p.id)
  }

  pub fn peers(&self) -> impl Iterator<Item = &PeerState> {
    self.entries.iter()
  }

  /// Inserts `state` unless it names `self_id`, is already present, or the
  /// view is full. Returns whether the insertion happened; the caller is
  /// expected to have already decided the eviction/reject policy via
  /// [`Self::is_full`] and [`Self::contains`] before calling this.
  pub fn add(&mut self, self_id: &PeerId, state: PeerState) -> bool {
    if &state.id == self_id || self.contains(&state.id) || self.is_full() {
      return false;
    }
    self.index.insert(state.id, self.entries.len());
    self.entries.push(state);
    true
  }

  /// Removes and returns the peer named `id`, if present. Idempotent.
  pub fn remove(&mut self, id: &PeerId) -> Option<PeerState> {
    let idx = *self.index.get(id)?;
    self.index.remove(id);
    let removed = self.entries.swap_remove(idx);
    if let Some(moved) = self.entries.get(idx) {
      self.index.insert(moved.id, idx);
    }
    Some(removed)
  }

  /// Removes and returns one uniformly random entry. Requires `size() > 0`.
  pub fn drop_random(&mut self, rng: &mut impl Rng) -> Option<PeerState> {
    if self.entries.is_empty() {
      return None;
    }
    let idx = rng.gen_range(0..self.entries.len());
    let id = self.entries[idx].id;
    self.remove(&id)
  }

  /// Uniform sample without replacement of up to `k` entries, excluding any
  /// identifier listed in `exclusions`.
  pub fn random_sample(
    &self,
    k: usize,
    exclusions: &[PeerId],
    rng: &mut impl Rng,
  ) -> Vec<PeerState> {
    let mut candidates: Vec<&PeerState> = self
      .entries
      .iter()
      .filter(|p| !exclusions.contains(&p.id))
      .collect();
    candidates.shuffle(rng);
    candidates.into_iter().take(k).cloned().collect()
  }

  /// Convenience wrapper over [`Self::random_sample`] for the common case of
  /// picking a single peer.
  pub fn random_peer(&self, exclusions: &[PeerId], rng: &mut impl Rng) -> Option<PeerId> {
    self
      .random_sample(1, exclusions, rng)
      .into_iter()
      .next()
      .map(|p| p.id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::{IpAddr, Ipv4Addr};

  fn peer(n: u16) -> PeerId {
    PeerId::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), n, n)
  }

  #[test]
  fn add_rejects_self_duplicate_and_overfull() {
    let me = peer(0);
    let mut view = View::new(1);
    assert!(!view.add(&me, PeerState::new(me)));
    assert!(view.add(&me, PeerState::new(peer(1))));
    assert!(!view.add(&me, PeerState::new(peer(1))));
    assert!(!view.add(&me, PeerState::new(peer(2))));
    assert_eq!(view.size(), 1);
  }

  #[test]
  fn remove_is_idempotent_and_preserves_other_entries() {
    let me = peer(0);
    let mut view = View::new(4);
    for n in 1..=3 {
      view.add(&me, PeerState::new(peer(n)));
    }
    assert!(view.remove(&peer(2)).is_some());
    assert!(view.remove(&peer(2)).is_none());
    assert_eq!(view.size(), 2);
    assert!(view.contains(&peer(1)));
    assert!(view.contains(&peer(3)));
  }

  #[test]
  fn random_sample_excludes_and_bounds_by_available_count() {
    let me = peer(0);
    let mut view = View::new(8);
    for n in 1..=3 {
      view.add(&me, PeerState::new(peer(n)));
    }
    let mut rng = rand::thread_rng();
    let sample = view.random_sample(10, &[peer(1)], &mut rng);
    assert_eq!(sample.len(), 2);
    assert!(sample.iter().all(|p| p.id != peer(1)));
  }

  #[test]
  fn drop_random_requires_nonempty_and_removes_one() {
    let me = peer(0);
    let mut view = View::new(2);
    let mut rng = rand::thread_rng();
    assert!(view.drop_random(&mut rng).is_none());
    view.add(&me, PeerState::new(peer(1)));
    view.add(&me, PeerState::new(peer(2)));
    assert!(view.drop_random(&mut rng).is_some());
    assert_eq!(view.size(), 1);
  }
}
