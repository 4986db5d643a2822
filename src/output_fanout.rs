//! The fan-out buffer: a set of per-subscriber cursors over a shared
//! sequence of produced elements, with independent demand per subscriber and
//! eviction of cancelled ones.
//!
//! The teacher crate's `ring.rs` models a single fixed-capacity,
//! const-generic ring shared by exactly one producer and one consumer. That
//! shape stops fitting once a stage must serve an arbitrary, dynamically
//! changing number of independently paced subscribers: there is no single
//! `N` to bake into a type, and cursors must be retired individually rather
//! than in lockstep. This keeps the teacher's core idea — a monotonic
//! sequence number addressing a bounded backing store, elements released
//! once nothing needs them — but backs it with a `VecDeque` indexed by an
//! absolute sequence rather than an unsafe fixed-size array of `MaybeUninit`
//! slots, since the actor (not multiple racing threads) is the buffer's only
//! owner.

use crate::error::{ProtocolError, StageError};
use crate::subscription::{Subscriber, SubscriptionId};
use crate::transfer_state::TransferState;
use std::collections::VecDeque;

/// Sentinel demand value representing "unbounded" (saturating ceiling for
/// `request(n)` accumulation).
const UNBOUNDED_DEMAND: u64 = u64::MAX;

struct SubscriberSlot<O> {
    id: SubscriptionId,
    subscriber: Box<dyn Subscriber<O>>,
    /// Next absolute sequence number this subscriber has not yet received.
    cursor: u64,
    demand: u64,
    cancelled: bool,
    terminated: bool,
}

impl<O> SubscriberSlot<O> {
    fn live(&self) -> bool {
        !self.cancelled && !self.terminated
    }
}

/// Bounded fan-out buffer shared by every live subscriber of a stage.
///
/// Elements are retained only until every live subscriber has consumed them
/// (`min-cursor` in `SPEC_FULL.md` §3); a subscriber lagging behind the
/// fastest one is what eventually fills the buffer to `max_size` and parks
/// the pump, not a per-subscriber queue (there isn't one).
pub struct OutputFanOut<O: Clone> {
    subscribers: Vec<SubscriberSlot<O>>,
    next_id: u64,
    buffer: VecDeque<O>,
    /// Absolute sequence number of `buffer.front()`.
    base_seq: u64,
    /// Absolute sequence number of the next element to be enqueued.
    tail_seq: u64,
    max_size: u64,
    producer_complete: bool,
    aborted: bool,
}

impl<O: Clone> OutputFanOut<O> {
    pub fn new(max_size: u64) -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
            buffer: VecDeque::new(),
            base_seq: 0,
            tail_seq: 0,
            max_size,
            producer_complete: false,
            aborted: false,
        }
    }

    /// Assigns a fresh subscription id, hands the subscriber its
    /// subscription handle, and starts its cursor at the current tail.
    ///
    /// If the stage has already begun shutting down, the subscriber
    /// receives the terminal signal immediately instead of a live
    /// subscription (Scenario F: a late subscriber never sees `onNext`).
    pub fn register_subscriber(
        &mut self,
        subscriber: Box<dyn Subscriber<O>>,
        make_subscription: impl FnOnce(SubscriptionId) -> crate::subscription::Subscription<O>,
    ) {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        if self.aborted {
            // shutdown_reason is not retained once aborted since abort()
            // clears all subscribers; a late subscriber is told generically.
            subscriber.on_subscribe(make_subscription(id));
            subscriber.on_error(StageError::Abrupt);
            return;
        }
        if self.producer_complete && self.subscribers.is_empty() && self.buffer.is_empty() {
            subscriber.on_subscribe(make_subscription(id));
            subscriber.on_complete();
            return;
        }

        subscriber.on_subscribe(make_subscription(id));
        self.subscribers.push(SubscriberSlot {
            id,
            subscriber,
            cursor: self.tail_seq,
            demand: 0,
            cancelled: false,
            terminated: false,
        });
        // A subscriber joining mid-flush starts caught up to the tail (it
        // missed nothing, since nothing further will ever be produced), so
        // it may already be eligible for `onComplete` right away.
        self.try_complete_drained();
    }

    /// Adds `n` to the subscriber's outstanding demand. `n` must be
    /// positive; the caller (the actor) is expected to have already rejected
    /// non-positive requests as a protocol violation (`SPEC_FULL.md` §7).
    pub fn more_requested(&mut self, id: SubscriptionId, n: u64) {
        if let Some(slot) = self.subscribers.iter_mut().find(|s| s.id == id && s.live()) {
            slot.demand = slot.demand.saturating_add(n).min(UNBOUNDED_DEMAND);
        }
        self.deliver_backlog(id);
        self.advance_base();
        self.try_complete_drained();
    }

    /// Marks a subscription cancelled. Idempotent; no further signals are
    /// sent to it after this call.
    pub fn unregister_subscription(&mut self, id: SubscriptionId) {
        if let Some(slot) = self.subscribers.iter_mut().find(|s| s.id == id) {
            slot.cancelled = true;
        }
        self.advance_base();
    }

    /// Appends `element` at the tail and immediately pushes it to every
    /// eligible subscriber (live, demand ≥ 1, cursor at the tail).
    ///
    /// # Errors
    /// Returns [`ProtocolError::InputOverflow`] if `buffer` is already at
    /// `max_size`. The pump only calls this while [`Self::needs_demand`] is
    /// executable, which itself requires headroom below `max_size`, so a
    /// well-behaved caller never hits this; it exists for callers that
    /// violate that precondition, instead of silently buffering unbounded
    /// elements.
    pub fn enqueue_output_element(&mut self, element: O) -> Result<(), ProtocolError> {
        if self.producer_complete || self.aborted {
            return Err(ProtocolError::OnNextAfterTerminal);
        }
        if self.buffer.len() as u64 >= self.max_size {
            return Err(ProtocolError::InputOverflow);
        }

        let seq = self.tail_seq;
        self.buffer.push_back(element.clone());
        self.tail_seq += 1;

        for slot in self.subscribers.iter_mut() {
            if slot.live() && slot.cursor == seq && slot.demand > 0 {
                slot.subscriber.on_next(element.clone());
                slot.demand -= 1;
                slot.cursor += 1;
            }
        }

        self.advance_base();
        Ok(())
    }

    /// Initiates graceful shutdown: once every live subscriber has drained
    /// to the tail it receives `onComplete`. No further enqueues are
    /// permitted afterwards.
    pub fn complete(&mut self) {
        self.producer_complete = true;
        self.try_complete_drained();
    }

    /// Sends `onError(cause)` to every live subscriber immediately and drops
    /// all buffered elements.
    pub fn abort(&mut self, cause: StageError) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        self.producer_complete = true;
        for slot in self.subscribers.iter_mut() {
            if slot.live() {
                slot.subscriber.on_error(cause.clone());
                slot.terminated = true;
            }
        }
        self.buffer.clear();
    }

    /// `true` once there are no live subscribers left and the producer has
    /// completed (or aborted): the stage's downstream side is fully closed.
    pub fn is_downstream_closed(&self) -> bool {
        self.producer_complete && self.subscribers.iter().all(|s| !s.live())
    }

    fn has_eligible_subscriber(&self) -> bool {
        self.subscribers
            .iter()
            .any(|s| s.live() && s.demand > 0 && s.cursor == self.tail_seq)
    }

    /// Replays buffered elements to `id` from its cursor up to the tail,
    /// bounded by its outstanding demand. This is what lets a subscriber
    /// that lagged behind the fastest one at `enqueue` time catch up once it
    /// finally issues `request(n)`, instead of silently missing elements
    /// still held in `buffer`.
    fn deliver_backlog(&mut self, id: SubscriptionId) {
        let Some(slot) = self.subscribers.iter_mut().find(|s| s.id == id && s.live()) else {
            return;
        };
        while slot.demand > 0 && slot.cursor < self.tail_seq {
            let offset = (slot.cursor - self.base_seq) as usize;
            let element = self.buffer[offset].clone();
            slot.subscriber.on_next(element);
            slot.demand -= 1;
            slot.cursor += 1;
        }
    }

    fn advance_base(&mut self) {
        let min_cursor = self
            .subscribers
            .iter()
            .filter(|s| s.live())
            .map(|s| s.cursor)
            .min()
            .unwrap_or(self.tail_seq);
        while self.base_seq < min_cursor && !self.buffer.is_empty() {
            self.buffer.pop_front();
            self.base_seq += 1;
        }
        self.subscribers.retain(SubscriberSlot::live);
    }

    fn try_complete_drained(&mut self) {
        if !self.producer_complete {
            return;
        }
        for slot in self.subscribers.iter_mut() {
            if slot.live() && slot.cursor == self.tail_seq {
                slot.subscriber.on_complete();
                slot.terminated = true;
            }
        }
    }

    /// `NeedsDemand`: ready while some live subscriber at the tail has
    /// demand *and* the buffer still has headroom below `max_size`;
    /// completed once downstream is fully closed.
    ///
    /// The headroom check is what makes a slow subscriber (one holding
    /// `min-cursor` low) eventually park the pump: once `buffer` fills to
    /// `max_size`, this reports not-ready even though a fast subscriber at
    /// the tail still has outstanding demand, instead of growing `buffer`
    /// without bound.
    pub fn needs_demand(&self) -> TransferState {
        let has_headroom = (self.buffer.len() as u64) < self.max_size;
        TransferState::new(
            self.has_eligible_subscriber() && has_headroom,
            self.is_downstream_closed(),
        )
    }

    /// `NeedsDemandOrCancel`: ready if any demand exists anywhere, or if
    /// downstream has already closed (useful for fan-in variants that must
    /// notice a dead downstream even with no pending demand).
    pub fn needs_demand_or_cancel(&self) -> TransferState {
        let any_demand = self.subscribers.iter().any(|s| s.live() && s.demand > 0);
        TransferState::new(any_demand || self.is_downstream_closed(), self.is_downstream_closed())
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|s| s.live()).count()
    }
}
