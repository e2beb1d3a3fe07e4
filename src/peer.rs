//! Peer identity.
//!
//! A peer is identified by a fixed address triple rather than by a
//! transport-level identity (e.g. a libp2p `PeerId`), because the transport
//! is an external collaborator to this crate (see crate-level docs).

use {
  serde::{Deserialize, Serialize},
  std::{fmt, net::IpAddr},
};

/// Stable identifier for a peer: its network address plus the two ports it
/// is reachable on (the listen port used for the membership protocol itself,
/// and an auxiliary port used by whatever analytics/metrics surface the
/// deployment exposes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId {
  pub address: IpAddr,
  pub listen_port: u16,
  pub analytics_port: u16,
}

impl PeerId {
  pub fn new(address: IpAddr, listen_port: u16, analytics_port: u16) -> Self {
    Self {
      address,
      listen_port,
      analytics_port,
    }
  }
}

impl fmt::Display for PeerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.address, self.listen_port, self.analytics_port)
  }
}

/// A peer as tracked inside one of the two views.
///
/// `out_connected` is true iff this node currently holds an established
/// outbound stream to the peer suitable for sending. A peer in the active
/// view may transiently have `out_connected == false` while a dial is
/// pending; nothing else in this crate depends on its value being always
/// up to date between event boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerState {
  pub id: PeerId,
  pub out_connected: bool,
}

impl PeerState {
  pub fn new(id: PeerId) -> Self {
    Self {
      id,
      out_connected: false,
    }
  }
}
