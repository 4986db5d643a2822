//! Readiness/termination descriptor returned by each invocation of a stage's
//! `transfer` function.
//!
//! A [`TransferState`] carries exactly two booleans: whether the transfer
//! function may be invoked right now ([`TransferState::is_ready`]), and
//! whether the stage it describes has terminated
//! ([`TransferState::is_completed`]). The two compose independently, which is
//! what lets [`Pump`](crate::pump::Pump) treat `NeedsInput`, `NeedsDemand`,
//! and their conjunction uniformly instead of special-casing each one.

use std::ops::{BitAnd, BitOr};

/// Whether a transfer function may run now, and whether it has terminated.
///
/// `is_ready` and `is_completed` are independent: a stage can be completed
/// without being ready (nothing left to do) or ready without being completed
/// (more work, not done yet). [`TransferState::is_executable`] is the
/// conjunction the pump actually loops on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferState {
    ready: bool,
    completed: bool,
}

impl TransferState {
    /// The distinguished starting value: not ready, not completed.
    ///
    /// A freshly constructed [`ProcessorActor`](crate::actor::ProcessorActor)
    /// holds this until its first `pump()` call asks the variant to
    /// recompute readiness against the live input/output state.
    pub const NOT_INITIALIZED: TransferState = TransferState {
        ready: false,
        completed: false,
    };

    /// Builds a state from its two components directly.
    pub const fn new(ready: bool, completed: bool) -> Self {
        Self { ready, completed }
    }

    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    /// `ready && !completed` — the condition the pump loops on.
    pub const fn is_executable(&self) -> bool {
        self.ready && !self.completed
    }

    /// Conjunction: ready iff both are ready, completed iff either is completed.
    ///
    /// Used to combine `NeedsInput` and `NeedsDemand` into
    /// `NeedsInputAndDemand` for a one-to-one transform: the stage may only
    /// run while there is both something to read and somewhere to put it,
    /// and it is done as soon as either side is done.
    pub const fn and(self, other: Self) -> Self {
        Self {
            ready: self.ready && other.ready,
            completed: self.completed || other.completed,
        }
    }

    /// Disjunction: ready iff either is ready, completed iff both are completed.
    ///
    /// Used for `NeedsDemandOrCancel`: a stage that may proceed on *either*
    /// having demand *or* downstream having gone away, and which is only
    /// done once both conditions independently hold.
    pub const fn or(self, other: Self) -> Self {
        Self {
            ready: self.ready || other.ready,
            completed: self.completed && other.completed,
        }
    }
}

impl BitAnd for TransferState {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

impl BitOr for TransferState {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}
