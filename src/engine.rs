//! The membership protocol engine (`spec.md` §4).
//!
//! This is a synchronous state machine: every public method corresponds to
//! one external event (a transport callback, a timer firing, or a message
//! arriving) and returns after mutating the two views and issuing whatever
//! effects are needed through the injected [`Transport`]. There are no
//! suspension points; blocking I/O is the transport's concern
//! (`spec.md` §5).

use {
  crate::{
    bootstrap::BootstrapCoordinator,
    config::Config,
    error::Error,
    message::{ForwardJoin, Message, Neighbour, NeighbourReply, Shuffle, ShuffleReply, PROTOCOL_ID},
    notification::Notifier,
    peer::{PeerId, PeerState},
    transport::{Timer, Transport, TransportEvent},
    view::View,
  },
  rand::Rng,
  std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
  },
  tracing::{debug, info, warn},
};

const PROMOTE_INTERVAL: Duration = Duration::from_secs(7);
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);

/// The last `Shuffle` this node emitted and is still awaiting a reply for.
/// Cleared on any `ShuffleReply` (matching or not) or on the next shuffle
/// emission (`spec.md` §3 invariants).
#[derive(Debug, Clone)]
struct PendingShuffle {
  id: u32,
  peers: Vec<PeerId>,
}

pub struct Engine {
  self_id: PeerId,
  config: Config,

  active_view: View,
  passive_view: View,

  last_shuffle: Option<PendingShuffle>,
  dangling_neighbours: HashMap<PeerId, u8>,
  pending_dials: HashSet<PeerId>,
  bootstrap: BootstrapCoordinator,

  /// Set once, when [`Self::start`] runs. Gates the `Promote` timer's
  /// startup grace period.
  engine_started: Option<Instant>,
  /// Updated every time a `Join` is actually sent. Rate-limits re-joins
  /// (`spec.md` §4.7).
  last_join_attempt: Option<Instant>,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    let self_id = config.self_id;
    let active_view = View::new(config.active_view_capacity);
    let passive_view = View::new(config.passive_view_capacity);
    let bootstrap = BootstrapCoordinator::new(config.bootstrap_peers.clone());

    Self {
      self_id,
      active_view,
      passive_view,
      last_shuffle: None,
      dangling_neighbours: HashMap::new(),
      pending_dials: HashSet::new(),
      bootstrap,
      engine_started: None,
      last_join_attempt: None,
      config,
    }
  }

  pub fn self_id(&self) -> PeerId {
    self.self_id
  }

  pub fn active_view(&self) -> &View {
    &self.active_view
  }

  pub fn passive_view(&self) -> &View {
    &self.passive_view
  }

  /// Checks the invariants of `spec.md` §3/§8. Exposed for tests; the
  /// engine itself maintains these incrementally rather than re-checking
  /// them on every call.
  pub fn check_invariants(&self) -> Result<(), Error> {
    if self.active_view.contains(&self.self_id) || self.passive_view.contains(&self.self_id) {
      return Err(Error::ViewOverlap(self.self_id));
    }
    for id in self.active_view.ids() {
      if self.passive_view.contains(id) {
        return Err(Error::ViewOverlap(*id));
      }
    }
    Ok(())
  }
}

// Lifecycle (`spec.md` §4.7)
impl Engine {
  /// Registers the engine's timers and attempts the initial join.
  pub fn start<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
    transport.register_timer(Timer::Shuffle, self.shuffle_delay());
    transport.register_periodic_timer(Timer::Promote, PROMOTE_INTERVAL, false);
    transport.register_periodic_timer(Timer::Maintenance, MAINTENANCE_INTERVAL, true);
    if let Some(interval) = self.config.debug_timer_interval {
      transport.register_periodic_timer(Timer::Debug, interval, false);
    }

    self.engine_started = Some(Instant::now());
    self.join_overlay(transport)
  }

  fn join_overlay<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
    if let Some(last) = self.last_join_attempt {
      if last.elapsed() < self.config.join_time {
        return Ok(());
      }
    }

    if self.config.bootstrap_peers.is_empty() {
      return Err(Error::EmptyBootstrapList);
    }

    if let Some(peer) = self.bootstrap.next(self.self_id) {
      debug!(target: "membership", peer = %peer, "sending Join");
      transport.send_message_side_stream(peer, Message::Join);
    }

    self.last_join_attempt = Some(Instant::now());
    Ok(())
  }

  fn on_promote_timer<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
    let started = match self.engine_started {
      Some(t) => t,
      None => return Ok(()),
    };
    if started.elapsed() < self.config.join_time {
      return Ok(());
    }

    if self.active_view.size() == 0 && self.passive_view.size() == 0 {
      return self.join_overlay(transport);
    }

    if !self.active_view.is_full() {
      if let Some(candidate) = self.passive_view.random_peer(&[], &mut rand::thread_rng()) {
        let high_priority = self.active_view.size() <= 1;
        transport.send_message_side_stream(candidate, Message::Neighbour(Neighbour { high_priority }));
      }
    }

    Ok(())
  }
}

// Transport callbacks (`spec.md` §4.2)
impl Engine {
  /// Convenience single entry point dispatching [`TransportEvent`]s; the
  /// distinct `handle_*` methods below remain the primary API since
  /// `InConnRequested` alone needs a return value.
  pub fn handle_transport_event<T: Transport>(&mut self, transport: &mut T, event: TransportEvent) -> bool {
    match event {
      TransportEvent::InConnRequested { dialer_protocol, .. } => self.handle_in_conn_requested(dialer_protocol),
      TransportEvent::DialSuccess { protocol, peer } => {
        self.handle_dial_success(transport, protocol, peer);
        true
      }
      TransportEvent::DialFailed { peer } => {
        self.handle_dial_failed(transport, peer);
        true
      }
      TransportEvent::OutConnDown { peer } => {
        self.handle_out_conn_down(transport, peer);
        true
      }
      TransportEvent::MessageDeliveryError { message, peer } => {
        self.handle_message_delivery_error(message, peer);
        true
      }
    }
  }

  /// Accepts inbound connection requests destined for this protocol only.
  /// The decision to add the dialer to the active view is deferred to the
  /// message handlers (`Join` / `ForwardJoinReply` / `Neighbour`).
  pub fn handle_in_conn_requested(&self, dialer_protocol: u32) -> bool {
    dialer_protocol == PROTOCOL_ID
  }

  pub fn handle_dial_success<T: Transport>(&mut self, transport: &mut T, protocol: u32, peer: PeerId) {
    if protocol != PROTOCOL_ID {
      return;
    }
    self.pending_dials.remove(&peer);

    if let Some(state) = self.active_view.get_mut(&peer) {
      state.out_connected = true;
      Notifier::emit_up(transport, peer, &self.active_view);
    } else {
      // Evicted between dial request and completion.
      transport.disconnect(peer);
    }
  }

  pub fn handle_dial_failed<T: Transport>(&mut self, transport: &mut T, peer: PeerId) {
    self.pending_dials.remove(&peer);
    self.handle_node_down(transport, peer);
  }

  pub fn handle_out_conn_down<T: Transport>(&mut self, transport: &mut T, peer: PeerId) {
    self.pending_dials.remove(&peer);
    self.handle_node_down(transport, peer);
  }

  pub fn handle_message_delivery_error(&mut self, message: Message, peer: PeerId) {
    match message {
      Message::Neighbour(_) => {
        if self.passive_view.remove(&peer).is_some() {
          debug!(target: "membership", peer = %peer, "dropped unreachable passive-view peer after Neighbour send failure");
        }
      }
      other => {
        debug!(target: "membership", peer = %peer, message = ?other, "message delivery failed; overlay is self-repairing");
      }
    }
  }
}

// Join / Forward-Join (`spec.md` §4.3)
impl Engine {
  fn handle_join<T: Transport>(&mut self, transport: &mut T, sender: PeerId) {
    self.insert_active(transport, sender);
    transport.send_message_side_stream(sender, Message::ForwardJoinReply);

    let ttl = self.config.active_random_walk_length;
    let peers: Vec<PeerState> = self.active_view.peers().cloned().collect();
    for peer in peers {
      if peer.id == sender || !peer.out_connected {
        continue;
      }
      transport.send_message(
        peer.id,
        Message::ForwardJoin(ForwardJoin {
          ttl,
          original_sender: sender,
        }),
        true,
      );
    }
  }

  fn handle_forward_join_reply<T: Transport>(&mut self, transport: &mut T, sender: PeerId) {
    self.insert_active(transport, sender);
  }

  fn handle_forward_join<T: Transport>(&mut self, transport: &mut T, sender: PeerId, msg: ForwardJoin) {
    assert_ne!(
      msg.original_sender, self.self_id,
      "received ForwardJoin naming ourselves as original sender: protocol bug"
    );

    if msg.ttl == 0 || self.active_view.size() == 1 {
      let newly_added = self.insert_active(transport, msg.original_sender);
      if newly_added {
        transport.send_message_side_stream(msg.original_sender, Message::ForwardJoinReply);
      }
      return;
    }

    if msg.ttl == self.config.passive_random_walk_length {
      self.insert_passive(msg.original_sender);
    }

    let exclusions = [msg.original_sender, sender];
    match self.active_view.random_peer(&exclusions, &mut rand::thread_rng()) {
      Some(target) => {
        transport.send_message(
          target,
          Message::ForwardJoin(ForwardJoin {
            ttl: msg.ttl - 1,
            original_sender: msg.original_sender,
          }),
          true,
        );
      }
      None => {
        let newly_added = self.insert_active(transport, msg.original_sender);
        if newly_added {
          transport.send_message_side_stream(msg.original_sender, Message::ForwardJoinReply);
        }
      }
    }
  }
}

// Neighbour promotion (`spec.md` §4.4)
impl Engine {
  fn handle_neighbour<T: Transport>(&mut self, transport: &mut T, sender: PeerId, msg: Neighbour) {
    if msg.high_priority {
      if self.insert_active(transport, sender) {
        transport.send_message_side_stream(sender, Message::NeighbourReply(NeighbourReply { accepted: true }));
      }
      return;
    }

    if self.active_view.is_full() {
      transport.send_message_side_stream(sender, Message::NeighbourReply(NeighbourReply { accepted: false }));
      return;
    }

    self.insert_active(transport, sender);
    transport.send_message_side_stream(sender, Message::NeighbourReply(NeighbourReply { accepted: true }));
  }

  fn handle_neighbour_reply<T: Transport>(&mut self, transport: &mut T, sender: PeerId, msg: NeighbourReply) {
    if msg.accepted {
      self.insert_active(transport, sender);
    }
  }
}

// Shuffle (`spec.md` §4.5)
impl Engine {
  fn shuffle_delay(&self) -> Duration {
    let base = self.config.min_shuffle_interval;
    let jitter_bound_ms = (base.as_millis().max(1)) as u64;
    let jitter = rand::thread_rng().gen_range(0..jitter_bound_ms);
    base + Duration::from_millis(jitter)
  }

  fn on_shuffle_timer<T: Transport>(&mut self, transport: &mut T) {
    transport.register_timer(Timer::Shuffle, self.shuffle_delay());

    if self.active_view.size() == 0 {
      return;
    }

    let mut rng = rand::thread_rng();
    let target = match self.active_view.random_peer(&[], &mut rng) {
      Some(t) => t,
      None => return,
    };

    let kp = self.config.passive_shuffle_sample.saturating_sub(1);
    let mut peers: Vec<PeerId> = self
      .passive_view
      .random_sample(kp, &[target], &mut rng)
      .into_iter()
      .map(|p| p.id)
      .collect();
    peers.extend(
      self
        .active_view
        .random_sample(self.config.active_shuffle_sample, &[target], &mut rng)
        .into_iter()
        .map(|p| p.id),
    );
    peers.push(self.self_id);

    let id = rng.gen::<u32>();
    self.last_shuffle = Some(PendingShuffle {
      id,
      peers: peers.clone(),
    });

    transport.send_message(
      target,
      Message::Shuffle(Shuffle {
        id,
        ttl: self.config.passive_random_walk_length,
        peers,
      }),
      true,
    );
  }

  fn handle_shuffle<T: Transport>(&mut self, transport: &mut T, sender: PeerId, msg: Shuffle) {
    if msg.ttl > 0 {
      if let Some(next) = self.active_view.random_peer(&[sender], &mut rand::thread_rng()) {
        transport.send_message(
          next,
          Message::Shuffle(Shuffle {
            id: msg.id,
            ttl: msg.ttl - 1,
            peers: msg.peers,
          }),
          true,
        );
        return;
      }
    }

    let mut exclusions = msg.peers.clone();
    exclusions.push(sender);
    let sample: Vec<PeerId> = self
      .passive_view
      .random_sample(msg.peers.len(), &exclusions, &mut rand::thread_rng())
      .into_iter()
      .map(|p| p.id)
      .collect();

    self.merge_shuffle_peers(msg.peers, &sample);

    transport.send_message_side_stream(
      sender,
      Message::ShuffleReply(ShuffleReply {
        id: msg.id,
        peers: sample,
      }),
    );
  }

  fn handle_shuffle_reply<T: Transport>(&mut self, _transport: &mut T, _sender: PeerId, msg: ShuffleReply) {
    // Non-matching (or absent) shuffle id: treat as if no shuffle were
    // pending, i.e. an empty first-to-evict list (`spec.md` §9).
    let first_to_evict = match &self.last_shuffle {
      Some(pending) if pending.id == msg.id => pending.peers.clone(),
      _ => Vec::new(),
    };
    self.merge_shuffle_peers(msg.peers, &first_to_evict);
    self.last_shuffle = None;
  }

  /// Merges received peers into the passive view, biasing eviction toward
  /// `first_to_evict` entries (peers we ourselves just advertised) before
  /// falling back to a random eviction (`spec.md` §4.5 merge algorithm).
  ///
  /// Deviation from the source implementation noted in `spec.md` §9: this
  /// removes the first matching entry from `first_to_evict` and stops,
  /// rather than attempting (and failing) to remove every match via broken
  /// index arithmetic.
  fn merge_shuffle_peers(&mut self, received: Vec<PeerId>, first_to_evict: &[PeerId]) {
    for candidate in received {
      if candidate == self.self_id || self.active_view.contains(&candidate) || self.passive_view.contains(&candidate)
      {
        continue;
      }

      if self.passive_view.is_full() {
        let evict = first_to_evict.iter().find(|id| self.passive_view.contains(id)).copied();
        match evict {
          Some(id) => {
            self.passive_view.remove(&id);
          }
          None => {
            self.passive_view.drop_random(&mut rand::thread_rng());
          }
        }
      }

      self.passive_view.add(&self.self_id, PeerState::new(candidate));
    }
  }
}

// Failure recovery and eviction (`spec.md` §4.6)
impl Engine {
  fn drop_random_from_active_view<T: Transport>(&mut self, transport: &mut T) {
    let victim = match self.active_view.drop_random(&mut rand::thread_rng()) {
      Some(v) => v,
      None => return,
    };

    let was_connected = victim.out_connected;
    self.insert_passive(victim.id);
    if was_connected {
      Notifier::emit_down(transport, victim.id, &self.active_view);
    }

    transport.send_message_side_stream(victim.id, Message::Disconnect);
    transport.disconnect(victim.id);
  }

  fn handle_node_down<T: Transport>(&mut self, transport: &mut T, peer: PeerId) {
    if let Some(state) = self.active_view.remove(&peer) {
      if state.out_connected {
        Notifier::emit_down(transport, peer, &self.active_view);
      }

      if !self.active_view.is_full() {
        if self.passive_view.size() == 0 && self.active_view.size() == 0 {
          if let Err(err) = self.join_overlay(transport) {
            warn!(target: "membership", error = %err, "re-join after total view loss failed");
          }
        } else if let Some(candidate) = self.passive_view.random_peer(&[], &mut rand::thread_rng()) {
          let high_priority = self.active_view.size() <= 1;
          transport.send_message_side_stream(candidate, Message::Neighbour(Neighbour { high_priority }));
        }
      }
    }

    transport.disconnect(peer);
  }

  fn handle_disconnect<T: Transport>(&mut self, transport: &mut T, sender: PeerId) {
    self.handle_node_down(transport, sender);
  }
}

// Neighbour maintenance (`spec.md` §4.8)
impl Engine {
  fn on_maintenance_timer<T: Transport>(&mut self, transport: &mut T) {
    let peers: Vec<PeerState> = self.active_view.peers().cloned().collect();
    for peer in peers {
      if !peer.out_connected && self.pending_dials.insert(peer.id) {
        transport.dial(peer.id);
      }
      transport.send_message(peer.id, Message::NeighbourMaintenance, true);
    }
  }

  fn handle_neighbour_maintenance<T: Transport>(&mut self, transport: &mut T, sender: PeerId) {
    match self.active_view.get(&sender) {
      Some(state) if state.out_connected => {
        self.dangling_neighbours.remove(&sender);
      }
      Some(_) => {
        if self.pending_dials.insert(sender) {
          transport.dial(sender);
        }
      }
      None => {
        let count = self.dangling_neighbours.entry(sender).or_insert(0);
        *count = count.saturating_add(1);
        if *count >= 3 {
          transport.send_message_side_stream(sender, Message::Disconnect);
        }
      }
    }
  }
}

// Shared view-mutation helpers
impl Engine {
  /// Adds `peer` to the active view, evicting a random incumbent (demoting
  /// it to the passive view) if full. Returns whether the peer was newly
  /// added; a silent no-op if `peer` names self or is already active.
  fn insert_active<T: Transport>(&mut self, transport: &mut T, peer: PeerId) -> bool {
    if peer == self.self_id || self.active_view.contains(&peer) {
      return false;
    }
    if self.active_view.is_full() {
      self.drop_random_from_active_view(transport);
    }

    self.passive_view.remove(&peer);
    let added = self.active_view.add(&self.self_id, PeerState::new(peer));
    assert!(added, "active view invariant violated on insertion");
    added
  }

  /// Adds `peer` to the passive view, evicting a random incumbent if full.
  fn insert_passive(&mut self, peer: PeerId) {
    if peer == self.self_id || self.active_view.contains(&peer) || self.passive_view.contains(&peer) {
      return;
    }
    if self.passive_view.is_full() {
      self.passive_view.drop_random(&mut rand::thread_rng());
    }
    let added = self.passive_view.add(&self.self_id, PeerState::new(peer));
    assert!(added, "passive view invariant violated on insertion");
  }
}

// Message dispatch
impl Engine {
  pub fn handle_message<T: Transport>(&mut self, transport: &mut T, from: PeerId, message: Message) {
    info!(target: "membership", peer = %from, message = ?message, "handling message");
    match message {
      Message::Join => self.handle_join(transport, from),
      Message::ForwardJoin(m) => self.handle_forward_join(transport, from, m),
      Message::ForwardJoinReply => self.handle_forward_join_reply(transport, from),
      Message::Neighbour(m) => self.handle_neighbour(transport, from, m),
      Message::NeighbourReply(m) => self.handle_neighbour_reply(transport, from, m),
      Message::Shuffle(m) => self.handle_shuffle(transport, from, m),
      Message::ShuffleReply(m) => self.handle_shuffle_reply(transport, from, m),
      Message::Disconnect => self.handle_disconnect(transport, from),
      Message::NeighbourMaintenance => self.handle_neighbour_maintenance(transport, from),
    }
  }

  pub fn handle_timer<T: Transport>(&mut self, transport: &mut T, timer: Timer) -> Result<(), Error> {
    match timer {
      Timer::Shuffle => {
        self.on_shuffle_timer(transport);
        Ok(())
      }
      Timer::Promote => self.on_promote_timer(transport),
      Timer::Maintenance => {
        self.on_maintenance_timer(transport);
        Ok(())
      }
      Timer::Debug => {
        self.log_state();
        Ok(())
      }
    }
  }

  fn log_state(&self) {
    info!(
      target: "membership",
      self = %self.self_id,
      active = self.active_view.size(),
      passive = self.passive_view.size(),
      "membership state"
    );
  }
}
