//! Error taxonomy for a processor stage.
//!
//! Errors are never recovered inside the core (see `SPEC_FULL.md` §7):
//! they are surfaced verbatim to every live subscriber as `on_error`, and the
//! stage then transitions to `ShutDown`. A [`StageError`] must be cheap to
//! clone since one failure fans out to every live subscriber.

use std::sync::Arc;
use thiserror::Error;

/// A type-erased upstream failure cause, shareable across clones of a
/// [`StageError`] without requiring the original error type to be `Clone`.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Violations of the reactive-streams protocol itself, as opposed to a
/// failure reported by a collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The first signal delivered to the actor was not `ExposedPublisher`.
    #[error("the first signal delivered to a processor stage must be ExposedPublisher")]
    ExpectedExposedPublisherFirst,

    /// `onSubscribe` was observed a second time.
    #[error("onSubscribe was received more than once")]
    DuplicateSubscribe,

    /// `onNext` arrived after the upstream had already completed or failed.
    #[error("onNext was received after upstream had already terminated")]
    OnNextAfterTerminal,

    /// The input buffer received more elements than it had requested.
    #[error("input buffer received more elements than were outstanding")]
    InputOverflow,

    /// A subscriber issued `request(0)`. `n` is `u64` throughout this crate
    /// (it can never be negative), so the only non-positive value possible
    /// is zero.
    #[error("subscriber requested a non-positive element count")]
    NonPositiveRequest,
}

/// The externally visible terminal cause delivered to subscribers via
/// `on_error`.
#[derive(Debug, Error, Clone)]
pub enum StageError {
    /// The stage itself violated, or detected a violation of, the protocol.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Upstream reported `onError(cause)`; propagated verbatim.
    #[error("upstream failed: {0}")]
    Upstream(UpstreamFailure),

    /// The variant's `transfer` function returned an error.
    #[error("transfer function failed: {0}")]
    Transfer(UpstreamFailure),

    /// The actor stopped without a graceful shutdown (e.g. dropped mailbox).
    #[error("stage terminated abruptly without a graceful shutdown")]
    Abrupt,
}

impl StageError {
    pub fn upstream(cause: Cause) -> Self {
        Self::Upstream(UpstreamFailure(cause))
    }

    pub fn transfer(cause: Cause) -> Self {
        Self::Transfer(UpstreamFailure(cause))
    }
}

/// Wraps an opaque [`Cause`] so it can be displayed and carried inside a
/// [`StageError`] variant without thiserror needing `Cause` itself to
/// implement `std::error::Error` (a blanket impl for `Arc<dyn Error>` does
/// not exist upstream).
#[derive(Debug, Clone)]
pub struct UpstreamFailure(pub Cause);

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UpstreamFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}
