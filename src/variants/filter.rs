use super::Variant;
use crate::error::StageError;
use crate::input_buffer::PrimaryInputs;
use crate::output_fanout::OutputFanOut;

/// Forwards only elements for which `predicate` returns `true`.
///
/// An element that fails the predicate is dropped without producing output;
/// the stage consumes no downstream demand for it. The pump simply
/// re-evaluates readiness on its next iteration — a dropped element does not
/// require a dedicated lookahead step since `transfer` is cheap to call
/// repeatedly.
pub struct Filter<T, P>
where
    P: FnMut(&T) -> bool + Send,
{
    predicate: P,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T, P> Filter<T, P>
where
    P: FnMut(&T) -> bool + Send,
{
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T, P> Variant<T, T> for Filter<T, P>
where
    T: Clone + Send,
    P: FnMut(&T) -> bool + Send,
{
    fn transfer(
        &mut self,
        input: &mut dyn PrimaryInputs<T>,
        output: &mut OutputFanOut<T>,
    ) -> Result<(), StageError> {
        let item = input.dequeue().expect("transfer called while input is not ready");
        if (self.predicate)(&item) {
            output.enqueue_output_element(item)?;
        }
        Ok(())
    }
}
