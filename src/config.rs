use {crate::peer::PeerId, std::time::Duration};

/// Engine configuration (`spec.md` §6).
#[derive(Debug, Clone)]
pub struct Config {
  /// This node's own identity. Never appears in either view.
  pub self_id: PeerId,

  /// Initial contact peers used by the bootstrap coordinator.
  pub bootstrap_peers: Vec<PeerId>,

  /// Timeout the transport applies to outbound dials; surfaced to the
  /// engine only as a `DialFailed` event, never waited on here.
  pub dial_timeout: Duration,

  /// Startup grace period and re-join rate limit.
  pub join_time: Duration,

  /// Active view capacity (A).
  pub active_view_capacity: usize,

  /// Passive view capacity (P). Must exceed `active_view_capacity`.
  pub passive_view_capacity: usize,

  /// Active random walk length (ARWL), bounds the `ForwardJoin` walk.
  pub active_random_walk_length: u8,

  /// Passive random walk length (PRWL). Must be strictly less than
  /// `active_random_walk_length`; marks the hop at which `ForwardJoin`
  /// caches the original sender into the forwarding peer's passive view.
  pub passive_random_walk_length: u8,

  /// Number of active-view peers included in a shuffle sample (Ka).
  pub active_shuffle_sample: usize,

  /// Number of passive-view peers included in a shuffle sample (Kp).
  pub passive_shuffle_sample: usize,

  /// Base interval between shuffle rounds; actual delay adds uniform
  /// jitter in `[0, min_shuffle_interval)`.
  pub min_shuffle_interval: Duration,

  /// Interval of an optional periodic state-logging timer. `None`
  /// disables it.
  pub debug_timer_interval: Option<Duration>,
}

impl Config {
  /// Active view capacity a HyParView deployment of `network_size` nodes is
  /// usually sized to (`ln(N) + C`), mirroring the sizing helper the
  /// teacher crate exposes on its own `Config`. Callers are free to set
  /// `active_view_capacity`/`passive_view_capacity` directly instead; this
  /// is offered only as a convenience for picking reasonable defaults.
  pub fn recommended_active_view_capacity(network_size: usize, c: usize) -> usize {
    ((network_size.max(1) as f64).ln() + c as f64).round() as usize
  }

  pub fn recommended_passive_view_capacity(active_view_capacity: usize, factor: usize) -> usize {
    active_view_capacity * factor
  }
}
