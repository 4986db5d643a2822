//! The per-stage transformation logic pluggable into a
//! [`ProcessorActor`](crate::actor::ProcessorActor).
//!
//! Every variant here is a one-to-one transform: it reads at most one input
//! element and produces at most zero or one output elements per `transfer`
//! call. This keeps `ready_state` identical across all three
//! ([`NeedsInputAndDemand`](crate::transfer_state::TransferState), `SPEC_FULL.md`
//! §4.4) — only `transfer` itself differs.

mod filter;
mod identity;
mod map;

pub use filter::Filter;
pub use identity::Identity;
pub use map::Map;

use crate::error::StageError;
use crate::input_buffer::PrimaryInputs;
use crate::output_fanout::OutputFanOut;
use crate::transfer_state::TransferState;

/// A stage's transformation behavior, parameterized over its input and
/// output element types.
///
/// Implementations must not block: `transfer` runs synchronously inside the
/// actor's `pump()`, and a blocking call there stalls every subscriber of
/// the stage.
pub trait Variant<In, Out>: Send {
    /// Computes current readiness by combining the input buffer's and the
    /// fan-out's own [`TransferState`]s.
    ///
    /// The default implementation is `NeedsInputAndDemand`: ready only while
    /// both something is buffered upstream and some live subscriber has
    /// demand, completed as soon as either side is. Override only if a
    /// variant's shape genuinely differs (none here do).
    fn ready_state(&self, input: &dyn PrimaryInputs<In>, output: &OutputFanOut<Out>) -> TransferState {
        input.transfer_state().and(output.needs_demand())
    }

    /// Consumes exactly one input element and applies the transform,
    /// pushing zero or one elements to `output`.
    ///
    /// Only called while [`Self::ready_state`] reports
    /// [`TransferState::is_executable`]; implementations may assume
    /// `input.dequeue()` returns `Some`.
    fn transfer(
        &mut self,
        input: &mut dyn PrimaryInputs<In>,
        output: &mut OutputFanOut<Out>,
    ) -> Result<(), StageError>;
}
