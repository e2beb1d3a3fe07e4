use {crate::peer::PeerId, thiserror::Error};

/// Fatal conditions (`spec.md` §7): the caller should log at error level and
/// abort the process rather than attempt to continue driving the engine.
///
/// True programming-bug invariant violations (adding self to a view,
/// duplicate insertion, overfull insertion, a `ForwardJoin` naming ourselves
/// as its original sender) are not represented here — they can only be
/// caused by a bug in this crate's own bookkeeping, not by external input,
/// and are asserted with `assert!`/`panic!` at the point they would occur
/// instead, matching the teacher crate's own `unwrap_or_else(|| panic!(...))`
/// style for "can't happen" conditions. `assert!` is used rather than
/// `debug_assert!` because it must not compile out in release builds
/// (`spec.md` §7: "prefer crash over silent corruption").
#[derive(Debug, Error)]
pub enum Error {
  #[error("bootstrap peer list is empty, cannot join overlay")]
  EmptyBootstrapList,

  #[error("peer {0} appears in both the active and passive view")]
  ViewOverlap(PeerId),
}
