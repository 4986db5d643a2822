//! The reactive-streams signal vocabulary (`SPEC_FULL.md` §3) and the two
//! narrower transport types the actor actually listens on.
//!
//! A [`ProcessorActor`](crate::actor::ProcessorActor) is driven by signals
//! arriving from two independent directions: upstream (a single producer)
//! and downstream (any number of subscribers plus the materializer). Each
//! direction gets its own mailbox so that the downstream-facing types
//! ([`Subscription`](crate::subscription::Subscription),
//! [`Publisher`](crate::subscription::Publisher)) never need to know the
//! upstream element type — only [`Signal`], the type [`ProcessorActor`]
//! dispatches internally (and the type scenario tests drive directly),
//! unifies both directions.

use crate::error::StageError;
use crate::input_buffer::UpstreamHandle;
use crate::subscription::{Publisher, SubscriptionId};

/// The full signal vocabulary a processor stage reacts to.
///
/// `In` is the element type received from upstream; `Out` is the element
/// type delivered to downstream subscribers.
pub enum Signal<In, Out> {
    /// Upstream handed over its handle: `onSubscribe`.
    OnSubscribe(Box<dyn UpstreamHandle>),
    /// Upstream produced an element: `onNext`.
    OnNext(In),
    /// Upstream is done: `onComplete`.
    OnComplete,
    /// Upstream failed: `onError(cause)`.
    OnError(StageError),
    /// The materializer exposed this stage's publisher. Must be the first
    /// signal the actor ever observes.
    ExposedPublisher(Publisher<Out>),
    /// At least one subscriber is waiting in the publisher's pending queue.
    SubscribePending,
    /// A subscriber requested `n` further elements.
    RequestMore(SubscriptionId, u64),
    /// A subscriber cancelled.
    Cancel(SubscriptionId),
}

impl<In, Out> Signal<In, Out> {
    /// A short, element-type-independent name for logging — the element
    /// types carried by `OnNext`/`ExposedPublisher` need not implement
    /// `Debug`, so this stands in for a derived one.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Signal::OnSubscribe(_) => "OnSubscribe",
            Signal::OnNext(_) => "OnNext",
            Signal::OnComplete => "OnComplete",
            Signal::OnError(_) => "OnError",
            Signal::ExposedPublisher(_) => "ExposedPublisher",
            Signal::SubscribePending => "SubscribePending",
            Signal::RequestMore(_, _) => "RequestMore",
            Signal::Cancel(_) => "Cancel",
        }
    }

    pub(crate) fn from_downstream(signal: DownstreamSignal<Out>) -> Self {
        match signal {
            DownstreamSignal::ExposedPublisher(p) => Signal::ExposedPublisher(p),
            DownstreamSignal::SubscribePending => Signal::SubscribePending,
            DownstreamSignal::RequestMore(id, n) => Signal::RequestMore(id, n),
            DownstreamSignal::Cancel(id) => Signal::Cancel(id),
        }
    }

    pub(crate) fn from_upstream(signal: UpstreamSignal<In>) -> Self {
        match signal {
            UpstreamSignal::OnSubscribe(h) => Signal::OnSubscribe(h),
            UpstreamSignal::OnNext(e) => Signal::OnNext(e),
            UpstreamSignal::OnComplete => Signal::OnComplete,
            UpstreamSignal::OnError(c) => Signal::OnError(c),
        }
    }
}

/// Upstream-ingress signals, carried on their own mailbox so upstream never
/// needs to know about subscriber bookkeeping.
///
/// Public since [`ActorHandles::upstream`](crate::actor::ActorHandles::upstream)
/// hands callers a raw `UnboundedSender<UpstreamSignal<In>>` — whatever acts
/// as upstream constructs these directly rather than going through a
/// `Subscriber`-shaped wrapper.
pub enum UpstreamSignal<In> {
    OnSubscribe(Box<dyn UpstreamHandle>),
    OnNext(In),
    OnComplete,
    OnError(StageError),
}

/// Downstream-ingress and materializer-ingress signals, carried on their own
/// mailbox. [`Subscription`](crate::subscription::Subscription) and
/// [`Publisher`](crate::subscription::Publisher) only ever produce these, so
/// neither needs to be generic over the upstream element type.
pub enum DownstreamSignal<Out> {
    ExposedPublisher(Publisher<Out>),
    SubscribePending,
    RequestMore(SubscriptionId, u64),
    Cancel(SubscriptionId),
}
