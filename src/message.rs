//! Wire message set for the membership protocol.
//!
//! These structs are `Serialize`/`Deserialize` so a transport crate can
//! encode them onto the wire, but this crate performs no byte encoding
//! itself — that is the transport's concern (`spec.md` §1).

use {
  crate::peer::PeerId,
  serde::{Deserialize, Serialize},
};

/// Protocol identifier this membership protocol registers with the
/// transport multiplexer (`spec.md` §6).
pub const PROTOCOL_ID: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
  Join,
  ForwardJoin(ForwardJoin),
  ForwardJoinReply,
  Neighbour(Neighbour),
  NeighbourReply(NeighbourReply),
  Shuffle(Shuffle),
  ShuffleReply(ShuffleReply),
  Disconnect,
  NeighbourMaintenance,
}

/// Forwarded along the active-view random walk started by a `Join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardJoin {
  /// Hop budget remaining. Decremented by one on every forward.
  pub ttl: u8,

  /// Identity of the node that originally sent `Join`.
  pub original_sender: PeerId,
}

/// Requests admission to the recipient's active view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbour {
  /// Asserted by a node whose active view holds at most one peer, forcing
  /// the recipient to admit it even if its own active view is full.
  pub high_priority: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighbourReply {
  pub accepted: bool,
}

/// Periodic passive-view refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shuffle {
  /// Correlates a `ShuffleReply` with the `Shuffle` that caused it.
  pub id: u32,

  /// Hop budget remaining.
  pub ttl: u8,

  /// Sample of peers the originator is advertising.
  pub peers: Vec<PeerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleReply {
  pub id: u32,
  pub peers: Vec<PeerId>,
}
