//! Shared multi-node test harness: an in-memory router driving several
//! [`Engine`] instances against each other without a real transport.

use {
  hyparview_core::{Config, Engine, Message, Notification, PeerId, Timer, Transport},
  std::{
    collections::{HashMap, VecDeque},
    net::{IpAddr, Ipv4Addr},
    time::Duration,
  },
};

pub fn peer(port: u16) -> PeerId {
  PeerId::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port, port + 1)
}

pub fn config(self_id: PeerId, bootstrap: Vec<PeerId>) -> Config {
  Config {
    self_id,
    bootstrap_peers: bootstrap,
    dial_timeout: Duration::from_secs(5),
    join_time: Duration::from_secs(30),
    active_view_capacity: 4,
    passive_view_capacity: 8,
    active_random_walk_length: 6,
    passive_random_walk_length: 3,
    active_shuffle_sample: 3,
    passive_shuffle_sample: 4,
    min_shuffle_interval: Duration::from_secs(60),
    debug_timer_interval: None,
  }
}

#[derive(Debug, Clone)]
enum Outbound {
  Stream { target: PeerId, message: Message },
  SideStream { target: PeerId, message: Message },
  Dial { target: PeerId },
  Disconnect { target: PeerId },
}

/// Records effects instead of performing them; [`Harness::drain`] replays
/// them against the rest of the simulated network.
#[derive(Default)]
pub struct SimTransport {
  outbound: VecDeque<Outbound>,
  pub notifications: Vec<Notification>,
}

impl Transport for SimTransport {
  fn send_message(&mut self, target: PeerId, message: Message, _reliable: bool) {
    self.outbound.push_back(Outbound::Stream { target, message });
  }

  fn send_message_side_stream(&mut self, target: PeerId, message: Message) {
    self.outbound.push_back(Outbound::SideStream { target, message });
  }

  fn dial(&mut self, target: PeerId) {
    self.outbound.push_back(Outbound::Dial { target });
  }

  fn disconnect(&mut self, target: PeerId) {
    self.outbound.push_back(Outbound::Disconnect { target });
  }

  fn register_timer(&mut self, _timer: Timer, _after: Duration) {}

  fn register_periodic_timer(&mut self, _timer: Timer, _every: Duration, _trigger_immediately: bool) {}

  fn send_notification(&mut self, notification: Notification) {
    self.notifications.push(notification);
  }
}

pub struct Node {
  pub engine: Engine,
  pub transport: SimTransport,
}

/// Drives a fixed set of nodes, delivering every message each node's engine
/// emits to the corresponding peer's engine until the network is quiescent.
/// Every dial is auto-completed (`DialSuccess`) immediately, mirroring a
/// reliable loopback transport.
pub struct Harness {
  pub nodes: HashMap<PeerId, Node>,
}

impl Harness {
  pub fn new() -> Self {
    Self { nodes: HashMap::new() }
  }

  pub fn add(&mut self, id: PeerId, bootstrap: Vec<PeerId>) {
    let mut node = Node {
      engine: Engine::new(config(id, bootstrap)),
      transport: SimTransport::default(),
    };
    node.engine.start(&mut node.transport).expect("bootstrap list must be non-empty in tests using start()");
    self.nodes.insert(id, node);
  }

  /// Adds a node without calling `start()`, for tests that drive the
  /// engine directly through message/event handlers instead.
  pub fn add_passive(&mut self, id: PeerId, bootstrap: Vec<PeerId>) {
    let node = Node {
      engine: Engine::new(config(id, bootstrap)),
      transport: SimTransport::default(),
    };
    self.nodes.insert(id, node);
  }

  /// Like [`Self::add`], but with a caller-supplied config (e.g. to shrink
  /// `join_time` so a test can force an immediate re-join).
  pub fn add_with_config(&mut self, id: PeerId, cfg: Config) {
    let mut node = Node {
      engine: Engine::new(cfg),
      transport: SimTransport::default(),
    };
    node.engine.start(&mut node.transport).expect("bootstrap list must be non-empty in tests using start()");
    self.nodes.insert(id, node);
  }

  /// Repeatedly drains every node's outbox, delivering effects to their
  /// targets, until no node produces new outbound effects or `max_rounds`
  /// is reached.
  pub fn drain(&mut self, max_rounds: usize) {
    for _ in 0..max_rounds {
      let mut any = false;
      let ids: Vec<PeerId> = self.nodes.keys().copied().collect();

      for id in ids {
        let pending: Vec<Outbound> = {
          let node = self.nodes.get_mut(&id).unwrap();
          node.transport.outbound.drain(..).collect()
        };
        if pending.is_empty() {
          continue;
        }
        any = true;

        for effect in pending {
          match effect {
            Outbound::Stream { target, message } | Outbound::SideStream { target, message } => {
              if let Some(target_node) = self.nodes.get_mut(&target) {
                target_node.engine.handle_message(&mut target_node.transport, id, message);
              }
            }
            Outbound::Dial { target } => {
              if let Some(target_node) = self.nodes.get_mut(&target) {
                // The dialed peer observes an inbound connection request.
                target_node.engine.handle_in_conn_requested(hyparview_core::PROTOCOL_ID);
              }
              if let Some(source_node) = self.nodes.get_mut(&id) {
                source_node
                  .engine
                  .handle_dial_success(&mut source_node.transport, hyparview_core::PROTOCOL_ID, target);
              }
            }
            Outbound::Disconnect { .. } => {}
          }
        }
      }

      if !any {
        break;
      }
    }
  }
}
