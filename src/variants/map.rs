use super::Variant;
use crate::error::StageError;
use crate::input_buffer::PrimaryInputs;
use crate::output_fanout::OutputFanOut;

/// Applies `f` to every input element, producing exactly one output element
/// per input.
pub struct Map<In, Out, F>
where
    F: FnMut(In) -> Out + Send,
{
    f: F,
    _marker: std::marker::PhantomData<fn(In) -> Out>,
}

impl<In, Out, F> Map<In, Out, F>
where
    F: FnMut(In) -> Out + Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<In, Out, F> Variant<In, Out> for Map<In, Out, F>
where
    In: Send,
    Out: Clone + Send,
    F: FnMut(In) -> Out + Send,
{
    fn transfer(
        &mut self,
        input: &mut dyn PrimaryInputs<In>,
        output: &mut OutputFanOut<Out>,
    ) -> Result<(), StageError> {
        let item = input.dequeue().expect("transfer called while input is not ready");
        let mapped = (self.f)(item);
        output.enqueue_output_element(mapped)?;
        Ok(())
    }
}
