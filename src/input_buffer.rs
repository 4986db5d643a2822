//! The bounded FIFO that absorbs upstream `onNext` signals, batches
//! `request(n)` upstream, and exposes a readiness signal to the pump.

use crate::error::ProtocolError;
use crate::transfer_state::TransferState;
use std::collections::VecDeque;

/// Opaque upstream capability: `request(n)` and `cancel()`, idempotent after
/// the first `cancel()`.
///
/// Implementors are expected to be cheap to hold behind a `Box<dyn _>` for
/// the lifetime of a single subscription; the core never calls `request`
/// with zero or a negative count.
pub trait UpstreamHandle: Send {
    fn request(&self, n: u64);
    fn cancel(&self);
}

/// The common interface shared by [`InputBuffer`] and [`EmptyInputs`], so the
/// actor can hold either behind one `Box<dyn PrimaryInputs<T>>` regardless of
/// whether upstream ever produced a subscription.
///
/// Public because [`Variant::ready_state`](crate::variants::Variant::ready_state)
/// and [`Variant::transfer`](crate::variants::Variant::transfer) take a
/// `&dyn PrimaryInputs<T>` — a custom variant needs to see this interface to
/// read the input side at all.
pub trait PrimaryInputs<T>: Send {
    fn enqueue(&mut self, item: T) -> Result<(), ProtocolError>;
    fn dequeue(&mut self) -> Option<T>;
    fn complete(&mut self);
    fn cancel(&mut self);
    fn clear(&mut self);
    fn is_empty(&self) -> bool;
    fn transfer_state(&self) -> TransferState;
}

/// Bounded FIFO with batched upstream `request(n)`.
///
/// On construction it issues the sole unsolicited `request` — the prefetch —
/// then subsequently requests in batches of `B = max(1, initial_size / 2)`
/// each time `B` elements have been dequeued since the last request, keeping
/// outstanding demand bounded without re-requesting on every single element.
///
/// `B` is keyed off `initial_size`, not `max_size`: only `initial_size`
/// elements are ever in flight before the first refill, so a threshold
/// derived from the (possibly much larger) `max_size` could sit above the
/// total number of elements ever prefetched, in which case the refill count
/// would never be reached and the stage would starve permanently once the
/// prefetch drained.
pub struct InputBuffer<T> {
    queue: VecDeque<T>,
    max_size: u64,
    batch: u64,
    dequeued_since_request: u64,
    upstream: Box<dyn UpstreamHandle>,
    upstream_finished: bool,
}

impl<T> InputBuffer<T> {
    /// Builds the buffer and issues the initial prefetch `request(initial_size)`.
    ///
    /// `max_size` bounds the queue occupancy; `initial_size` must not exceed
    /// it (enforced by [`crate::config::Settings`] at the materializer
    /// boundary).
    pub fn new(upstream: Box<dyn UpstreamHandle>, initial_size: u64, max_size: u64) -> Self {
        let batch = (initial_size / 2).max(1);
        upstream.request(initial_size);
        Self {
            queue: VecDeque::new(),
            max_size,
            batch,
            dequeued_since_request: 0,
            upstream,
            upstream_finished: false,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl<T: Send> PrimaryInputs<T> for InputBuffer<T> {
    fn enqueue(&mut self, item: T) -> Result<(), ProtocolError> {
        if self.upstream_finished {
            return Err(ProtocolError::OnNextAfterTerminal);
        }
        if self.queue.len() as u64 >= self.max_size {
            return Err(ProtocolError::InputOverflow);
        }
        self.queue.push_back(item);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<T> {
        let item = self.queue.pop_front()?;
        self.dequeued_since_request += 1;
        if self.dequeued_since_request >= self.batch {
            self.upstream.request(self.dequeued_since_request);
            self.dequeued_since_request = 0;
        }
        Some(item)
    }

    fn complete(&mut self) {
        self.upstream_finished = true;
    }

    fn cancel(&mut self) {
        self.upstream.cancel();
        self.upstream_finished = true;
        self.clear();
    }

    fn clear(&mut self) {
        self.queue.clear();
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn transfer_state(&self) -> TransferState {
        TransferState::new(!self.is_empty(), self.is_empty() && self.upstream_finished)
    }
}

/// Sentinel used when upstream completes before ever sending a subscription.
///
/// Never has input, is immediately completed, and every operation besides
/// `cancel` (a no-op) and reading state is a no-op.
pub struct EmptyInputs;

impl<T: Send> PrimaryInputs<T> for EmptyInputs {
    fn enqueue(&mut self, _item: T) -> Result<(), ProtocolError> {
        Err(ProtocolError::OnNextAfterTerminal)
    }

    fn dequeue(&mut self) -> Option<T> {
        None
    }

    fn complete(&mut self) {}

    fn cancel(&mut self) {}

    fn clear(&mut self) {}

    fn is_empty(&self) -> bool {
        true
    }

    fn transfer_state(&self) -> TransferState {
        TransferState::new(false, true)
    }
}
