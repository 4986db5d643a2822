//! Downstream-facing capabilities: the `Subscriber` a consumer implements,
//! the `Subscription` handle it is given back, and the `Publisher` through
//! which the materializer hands it new subscribers.

use crate::error::StageError;
use crate::signal::DownstreamSignal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

/// Identity of a live subscription, assigned by
/// [`OutputFanOut::register_subscriber`](crate::output_fanout::OutputFanOut::register_subscriber).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// The capability a downstream consumer implements: `onSubscribe`, `onNext`,
/// `onComplete`, `onError`.
///
/// Calls are made synchronously from within the actor's `pump()`; an
/// implementation must not block or attempt to re-enter the stage.
pub trait Subscriber<T>: Send {
    fn on_subscribe(&self, subscription: Subscription<T>);
    fn on_next(&self, item: T);
    fn on_complete(&self);
    fn on_error(&self, cause: StageError);
}

/// A live subscriber's capability to request more elements or cancel,
/// handed back by `on_subscribe`.
///
/// Cheap to clone; every clone forwards into the same processor mailbox, so
/// calling `cancel()` twice (or from two clones) is idempotent.
pub struct Subscription<T> {
    id: SubscriptionId,
    mailbox: UnboundedSender<DownstreamSignal<T>>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(id: SubscriptionId, mailbox: UnboundedSender<DownstreamSignal<T>>) -> Self {
        Self { id, mailbox }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Requests `n` further elements. `n` must be positive; the actor fails
    /// the whole stage otherwise (see `SPEC_FULL.md` §7).
    pub fn request(&self, n: u64) {
        let _ = self.mailbox.send(DownstreamSignal::RequestMore(self.id, n));
    }

    pub fn cancel(&self) {
        let _ = self.mailbox.send(DownstreamSignal::Cancel(self.id));
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            mailbox: self.mailbox.clone(),
        }
    }
}

/// The publisher handle exposed to the materializer via `ExposedPublisher`.
///
/// Accumulates subscribers offered through [`Publisher::subscribe`] in a
/// pending queue and wakes the actor with `Signal::SubscribePending`; the
/// actor later drains the queue from within its own single-threaded
/// execution, matching the "no signal emission before `publisherExposed`"
/// ordering rule.
pub struct Publisher<T> {
    pending: Arc<Mutex<VecDeque<Box<dyn Subscriber<T>>>>>,
    mailbox: UnboundedSender<DownstreamSignal<T>>,
}

impl<T> Publisher<T> {
    pub(crate) fn new(mailbox: UnboundedSender<DownstreamSignal<T>>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(VecDeque::new())),
            mailbox,
        }
    }

    pub(crate) fn drain_pending(&self) -> VecDeque<Box<dyn Subscriber<T>>> {
        std::mem::take(&mut *self.pending.lock().expect("publisher mutex poisoned"))
    }

    /// Offers a new subscriber to the stage. Never calls back synchronously;
    /// the actor observes it on its next mailbox turn.
    pub fn subscribe(&self, subscriber: impl Subscriber<T> + 'static) {
        self.pending
            .lock()
            .expect("publisher mutex poisoned")
            .push_back(Box::new(subscriber));
        let _ = self.mailbox.send(DownstreamSignal::SubscribePending);
    }
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            pending: self.pending.clone(),
            mailbox: self.mailbox.clone(),
        }
    }
}
