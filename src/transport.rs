//! Abstraction over the transport/connection manager and timer service.
//!
//! Both are explicitly out of scope for this crate (`spec.md` §1): the
//! engine never opens a socket or arms a real timer, it only calls through
//! this trait. A concrete deployment implements [`Transport`] on top of
//! whatever connection manager and timer service it actually has.

use {crate::message::Message, crate::notification::Notification, crate::peer::PeerId, std::time::Duration};

/// Named timers the engine registers with the external timer service
/// (`spec.md` §4.7, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
  /// Periodic passive-view refresh. Re-armed by the engine itself from
  /// within its own handler rather than registered as periodic, so that
  /// each tick can apply fresh jitter (`spec.md` §4.5, §9 design notes).
  Shuffle,

  /// Periodic active-view refill attempt.
  Promote,

  /// Periodic dead-neighbour detection heartbeat.
  Maintenance,

  /// Optional periodic diagnostic state dump.
  Debug,
}

/// Events the external transport/connection manager delivers to the engine
/// (`spec.md` §4.2).
#[derive(Debug, Clone)]
pub enum TransportEvent {
  InConnRequested { dialer_protocol: u32, peer: PeerId },
  DialSuccess { protocol: u32, peer: PeerId },
  DialFailed { peer: PeerId },
  OutConnDown { peer: PeerId },
  MessageDeliveryError { message: Message, peer: PeerId },
}

/// Upstream contract the engine drives (`spec.md` §6).
pub trait Transport {
  /// Sends on the peer's established outbound stream.
  fn send_message(&mut self, target: PeerId, message: Message, reliable: bool);

  /// One-shot connect-send-close used when no established stream exists
  /// yet to `target` (`spec.md` §5: side-stream sends carry no ordering
  /// guarantee relative to stream traffic).
  fn send_message_side_stream(&mut self, target: PeerId, message: Message);

  /// Requests a dial to `target` using this protocol's id.
  fn dial(&mut self, target: PeerId);

  /// Requests the established stream to `target` be closed.
  fn disconnect(&mut self, target: PeerId);

  /// Registers a one-shot timer.
  fn register_timer(&mut self, timer: Timer, after: Duration);

  /// Registers a periodic timer. `trigger_immediately` requests an
  /// immediate first firing in addition to the periodic schedule.
  fn register_periodic_timer(&mut self, timer: Timer, every: Duration, trigger_immediately: bool);

  /// Hands a notification to whatever subscribes to membership events.
  fn send_notification(&mut self, notification: Notification);
}
