//! Emits "neighbour up" / "neighbour down" notifications carrying an
//! immutable snapshot of the active view (`spec.md` §4.2, §5, §6).

use {
  crate::{peer::PeerId, transport::Transport, view::View},
  std::collections::HashSet,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
  NeighbourUp { peer: PeerId, view: HashSet<PeerId> },
  NeighbourDown { peer: PeerId, view: HashSet<PeerId> },
}

/// Stateless helper that snapshots the active view and hands a notification
/// to the transport. Kept as its own type, rather than inlined into the
/// engine, so the "hand over an immutable copy" rule (`spec.md` §5) has a
/// single enforcement point.
pub(crate) struct Notifier;

impl Notifier {
  pub(crate) fn emit_up<T: Transport>(transport: &mut T, peer: PeerId, active_view: &View) {
    transport.send_notification(Notification::NeighbourUp {
      peer,
      view: snapshot(active_view),
    });
  }

  pub(crate) fn emit_down<T: Transport>(transport: &mut T, peer: PeerId, active_view: &View) {
    transport.send_notification(Notification::NeighbourDown {
      peer,
      view: snapshot(active_view),
    });
  }
}

/// `view` is the set of currently `out_connected` active-view peers
/// (`spec.md` §6).
fn snapshot(view: &View) -> HashSet<PeerId> {
  view.peers().filter(|p| p.out_connected).map(|p| p.id).collect()
}
