//! The executor loop that drives a [`Variant`] against its input and output
//! sides until neither has anything left to do.

use crate::error::StageError;
use crate::input_buffer::PrimaryInputs;
use crate::output_fanout::OutputFanOut;
use crate::variants::Variant;

/// What a [`Pump::run`] call settled into.
pub(crate) enum PumpOutcome {
    /// Ran out of executable work for now; nothing terminated.
    Parked,
    /// The combined input/output [`TransferState`](crate::transfer_state::TransferState)
    /// reported completion.
    Completed,
}

/// Drives `variant.transfer()` in a tight loop for as long as
/// `ready_state().is_executable()` holds, stopping the instant it isn't.
///
/// Guards against reentrancy: a `Subscriber::on_next` callback invoked from
/// within `transfer` must not itself trigger another `run()` on the same
/// pump (e.g. a synchronous `request()` call that loops back into the
/// mailbox before this call returns) — `in_pump` makes a nested call a no-op
/// that immediately reports `Parked`, matching the single-threaded,
/// one-signal-at-a-time execution model the rest of the actor relies on.
#[derive(Default)]
pub(crate) struct Pump {
    in_pump: bool,
}

impl Pump {
    pub fn new() -> Self {
        Self { in_pump: false }
    }

    pub fn run<In, Out>(
        &mut self,
        variant: &mut dyn Variant<In, Out>,
        input: &mut dyn PrimaryInputs<In>,
        output: &mut OutputFanOut<Out>,
    ) -> Result<PumpOutcome, StageError> {
        if self.in_pump {
            return Ok(PumpOutcome::Parked);
        }
        self.in_pump = true;
        let outcome = self.run_inner(variant, input, output);
        self.in_pump = false;
        outcome
    }

    fn run_inner<In, Out>(
        &mut self,
        variant: &mut dyn Variant<In, Out>,
        input: &mut dyn PrimaryInputs<In>,
        output: &mut OutputFanOut<Out>,
    ) -> Result<PumpOutcome, StageError> {
        let mut iterations = 0u64;
        loop {
            let state = variant.ready_state(input, output);
            if state.is_completed() {
                tracing::trace!(iterations, "pump parked: completed");
                return Ok(PumpOutcome::Completed);
            }
            if !state.is_ready() {
                tracing::trace!(iterations, "pump parked: not ready");
                return Ok(PumpOutcome::Parked);
            }
            variant.transfer(input, output)?;
            iterations += 1;
        }
    }
}
