use super::Variant;
use crate::error::StageError;
use crate::input_buffer::PrimaryInputs;
use crate::output_fanout::OutputFanOut;

/// Forwards every input element to output unchanged.
///
/// Mostly useful for tests and as the degenerate case confirming the actor's
/// plumbing works before a real transform is plugged in.
#[derive(Debug, Default)]
pub struct Identity;

impl<T: Clone + Send> Variant<T, T> for Identity {
    fn transfer(
        &mut self,
        input: &mut dyn PrimaryInputs<T>,
        output: &mut OutputFanOut<T>,
    ) -> Result<(), StageError> {
        let item = input.dequeue().expect("transfer called while input is not ready");
        output.enqueue_output_element(item)?;
        Ok(())
    }
}
