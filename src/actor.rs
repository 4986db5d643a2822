//! The processor stage itself: a single-threaded actor that owns the input
//! buffer, the fan-out buffer, and a [`Variant`], and drives them from a
//! `tokio::select!` loop over its two mailboxes.

use crate::config::Settings;
use crate::error::{ProtocolError, StageError};
use crate::input_buffer::{EmptyInputs, InputBuffer, PrimaryInputs};
use crate::output_fanout::OutputFanOut;
use crate::pump::{Pump, PumpOutcome};
use crate::signal::{DownstreamSignal, Signal, UpstreamSignal};
use crate::subscription::{Publisher, Subscription};
use crate::variants::Variant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Where in its lifecycle a stage currently is (`SPEC_FULL.md` §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Waiting for the materializer to hand over this stage's `Publisher`.
    /// Must be the very first thing the actor observes.
    WaitingExposedPublisher,
    /// Publisher exposed; waiting for upstream's `onSubscribe`.
    WaitingForUpstream,
    /// Both sides live; pumping elements through the variant.
    Running,
    /// Upstream finished (or was never subscribed); draining buffered
    /// output to whatever subscribers remain.
    Flushing,
    /// Terminated. No further signals are acted on.
    ShutDown,
}

/// Mailbox senders and the publisher handle a materializer needs to wire a
/// stage into the rest of a graph, returned by [`ProcessorActor::spawn`].
pub struct ActorHandles<In, Out> {
    pub upstream: UnboundedSender<UpstreamSignal<In>>,
    pub downstream: UnboundedSender<DownstreamSignal<Out>>,
    pub publisher: Publisher<Out>,
}

/// The actor itself. Construct with [`ProcessorActor::spawn`] and drive with
/// [`ProcessorActor::run`]; [`ProcessorActor::dispatch`] is exposed
/// separately so tests can feed it one [`Signal`] at a time without needing
/// a live tokio runtime.
pub struct ProcessorActor<V, In, Out> {
    state: ActorState,
    settings: Settings,
    variant: V,
    input: Box<dyn PrimaryInputs<In>>,
    output: OutputFanOut<Out>,
    pump: Pump,
    publisher: Option<Publisher<Out>>,
    downstream_tx: UnboundedSender<DownstreamSignal<Out>>,
    upstream_rx: UnboundedReceiver<UpstreamSignal<In>>,
    downstream_rx: UnboundedReceiver<DownstreamSignal<Out>>,
}

impl<V, In, Out> ProcessorActor<V, In, Out>
where
    V: Variant<In, Out>,
    In: Send,
    Out: Clone + Send,
{
    /// Builds a new actor in [`ActorState::WaitingExposedPublisher`] and
    /// immediately folds in its own `ExposedPublisher` signal — the
    /// materializer's first obligation — so callers never have to remember
    /// to do it themselves.
    pub fn spawn(variant: V, settings: Settings) -> (Self, ActorHandles<In, Out>) {
        let (upstream_tx, upstream_rx) = mpsc::unbounded_channel();
        let (downstream_tx, downstream_rx) = mpsc::unbounded_channel();
        let publisher = Publisher::new(downstream_tx.clone());

        let mut actor = Self {
            state: ActorState::WaitingExposedPublisher,
            settings,
            variant,
            input: Box::new(EmptyInputs),
            output: OutputFanOut::new(settings.max_fan_out_buffer_size()),
            pump: Pump::new(),
            publisher: None,
            downstream_tx: downstream_tx.clone(),
            upstream_rx,
            downstream_rx,
        };

        let handles = ActorHandles {
            upstream: upstream_tx,
            downstream: downstream_tx,
            publisher: publisher.clone(),
        };

        let _ = actor.dispatch(Signal::ExposedPublisher(publisher));
        (actor, handles)
    }

    /// The async driver loop: merges both mailboxes and dispatches each
    /// signal in arrival order until the actor reaches
    /// [`ActorState::ShutDown`].
    ///
    /// A closed upstream mailbox (the sender side dropped without an
    /// explicit `onComplete`/`onError`) is treated as an abrupt failure
    /// rather than silent completion, matching `SPEC_FULL.md` §7.
    pub async fn run(mut self) {
        loop {
            if self.state == ActorState::ShutDown {
                break;
            }
            let signal = tokio::select! {
                biased;
                up = self.upstream_rx.recv() => match up {
                    Some(s) => Signal::from_upstream(s),
                    None => Signal::OnError(StageError::Abrupt),
                },
                down = self.downstream_rx.recv() => match down {
                    Some(s) => Signal::from_downstream(s),
                    None => continue,
                },
            };
            if let Err(cause) = self.dispatch(signal) {
                tracing::warn!(error = %cause, "processor stage failed");
            }
        }
        tracing::debug!("processor stage shut down");
    }

    /// Applies one signal to the actor's state machine, running the pump
    /// afterwards whenever the signal could have changed readiness.
    ///
    /// This is the actor's entire behavior, expressed synchronously so
    /// scenario tests can drive it without a runtime.
    pub fn dispatch(&mut self, signal: Signal<In, Out>) -> Result<(), StageError> {
        tracing::trace!(state = ?self.state, signal = signal.kind(), "dispatching signal");
        if self.state == ActorState::ShutDown {
            // Upstream-facing signals are stale noise once shut down and are
            // silently dropped by `dispatch_downstream`'s catch-all, but a
            // subscriber arriving late still deserves a terminal signal
            // rather than silence — `OutputFanOut::register_subscriber`
            // already knows how to greet it with an immediate `onComplete`
            // or `onError`.
            return self.dispatch_downstream(signal, true);
        }

        match (self.state, signal) {
            (ActorState::WaitingExposedPublisher, Signal::ExposedPublisher(publisher)) => {
                self.publisher = Some(publisher);
                self.transition(ActorState::WaitingForUpstream);
                Ok(())
            }
            (ActorState::WaitingExposedPublisher, _) => {
                self.fail(ProtocolError::ExpectedExposedPublisherFirst.into(), true);
                Ok(())
            }

            (ActorState::WaitingForUpstream, Signal::OnSubscribe(handle)) => {
                self.input = Box::new(InputBuffer::new(
                    handle,
                    self.settings.initial_input_buffer_size(),
                    self.settings.max_input_buffer_size(),
                ));
                self.transition(ActorState::Running);
                self.pump()
            }
            (ActorState::WaitingForUpstream, Signal::OnComplete) => {
                self.input = Box::new(EmptyInputs);
                self.pump()
            }
            (ActorState::WaitingForUpstream, Signal::OnError(cause)) => {
                self.fail(cause, false);
                Ok(())
            }
            // `OnSubscribe` is already handled above in this state; only a
            // duplicate `ExposedPublisher` can reach here.
            (ActorState::WaitingForUpstream, Signal::ExposedPublisher(_)) => {
                self.fail(ProtocolError::DuplicateSubscribe.into(), true);
                Ok(())
            }
            // No input source exists yet, so there is nothing to pump: a
            // subscriber arriving or adjusting demand here only updates the
            // fan-out's own bookkeeping, it cannot be pumped against the
            // `EmptyInputs` placeholder without mistaking "no upstream yet"
            // for "upstream already completed" (both report `transfer_state`
            // as always-completed).
            (ActorState::WaitingForUpstream, other) => self.dispatch_downstream(other, false),

            (ActorState::Running, signal) | (ActorState::Flushing, signal) => {
                self.dispatch_active(signal)
            }

            (ActorState::ShutDown, _) => Ok(()),
        }
    }

    fn dispatch_active(&mut self, signal: Signal<In, Out>) -> Result<(), StageError> {
        match signal {
            Signal::OnNext(item) => {
                if let Err(e) = self.input.enqueue(item) {
                    self.fail(e.into(), true);
                    return Ok(());
                }
                self.pump()
            }
            Signal::OnComplete => {
                self.input.complete();
                self.transition(ActorState::Flushing);
                self.pump()
            }
            Signal::OnError(cause) => {
                self.fail(cause, false);
                Ok(())
            }
            Signal::OnSubscribe(_) | Signal::ExposedPublisher(_) => {
                self.fail(ProtocolError::DuplicateSubscribe.into(), true);
                Ok(())
            }
            other => self.dispatch_downstream(other, true),
        }
    }

    /// Handles the three downstream-only signals. `pump_after` is `false`
    /// while waiting for upstream's `onSubscribe`, since pumping against the
    /// `EmptyInputs` placeholder there would misread "no upstream yet" as
    /// "upstream already completed" and shut the stage down prematurely.
    fn dispatch_downstream(&mut self, signal: Signal<In, Out>, pump_after: bool) -> Result<(), StageError> {
        match signal {
            Signal::SubscribePending => {
                if let Some(publisher) = &self.publisher {
                    let pending = publisher.drain_pending();
                    for subscriber in pending {
                        let tx = self.downstream_tx.clone();
                        self.output
                            .register_subscriber(subscriber, move |id| Subscription::new(id, tx));
                    }
                }
                if pump_after { self.pump() } else { Ok(()) }
            }
            Signal::RequestMore(id, n) => {
                if n == 0 {
                    self.fail(ProtocolError::NonPositiveRequest.into(), true);
                    return Ok(());
                }
                self.output.more_requested(id, n);
                if pump_after { self.pump() } else { Ok(()) }
            }
            Signal::Cancel(id) => {
                self.output.unregister_subscription(id);
                if pump_after { self.pump() } else { Ok(()) }
            }
            _ => Ok(()),
        }
    }

    fn pump(&mut self) -> Result<(), StageError> {
        let outcome = self.pump.run(&mut self.variant, self.input.as_mut(), &mut self.output)?;
        if let PumpOutcome::Completed = outcome {
            self.on_pump_completed();
        }
        Ok(())
    }

    fn on_pump_completed(&mut self) {
        if self.input.transfer_state().is_completed() {
            self.output.complete();
        }
        if self.output.is_downstream_closed() {
            self.input.cancel();
            self.transition(ActorState::ShutDown);
        } else {
            self.transition(ActorState::Flushing);
        }
    }

    /// Fails the stage: aborts every live subscriber with `cause`, then
    /// shuts down. `cancel_upstream` should be `false` when `cause`
    /// originated from upstream itself (`onError`) — upstream is already
    /// terminated at that point, and re-cancelling it violates §7's "upstream
    /// is not re-cancelled" rule, even though the handle's `cancel()` is
    /// harmless if called anyway.
    fn fail(&mut self, cause: StageError, cancel_upstream: bool) {
        tracing::warn!(error = %cause, state = ?self.state, "stage failing");
        self.output.abort(cause);
        if cancel_upstream {
            self.input.cancel();
        }
        self.transition(ActorState::ShutDown);
    }

    fn transition(&mut self, next: ActorState) {
        if next != self.state {
            tracing::debug!(from = ?self.state, to = ?next, "lifecycle transition");
        }
        self.state = next;
    }

    pub fn state(&self) -> ActorState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{Subscriber, SubscriptionId};
    use crate::variants::Identity;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingUpstream {
        requested: AtomicU64,
        cancelled: AtomicBool,
    }

    impl crate::input_buffer::UpstreamHandle for Arc<RecordingUpstream> {
        fn request(&self, n: u64) {
            self.requested.fetch_add(n, Ordering::SeqCst);
        }
        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Clone)]
    enum Event {
        Next(u32),
        Complete,
        Error,
    }

    struct Recorder(Arc<Mutex<Vec<Event>>>);

    impl Subscriber<u32> for Recorder {
        fn on_subscribe(&self, _subscription: Subscription<u32>) {}
        fn on_next(&self, item: u32) {
            self.0.lock().unwrap().push(Event::Next(item));
        }
        fn on_complete(&self) {
            self.0.lock().unwrap().push(Event::Complete);
        }
        fn on_error(&self, _cause: StageError) {
            self.0.lock().unwrap().push(Event::Error);
        }
    }

    fn settings(max: u64) -> Settings {
        Settings::builder()
            .initial_input_buffer_size(max)
            .max_input_buffer_size(max)
            .initial_fan_out_buffer_size(max)
            .max_fan_out_buffer_size(max)
            .build()
            .unwrap()
    }

    #[test]
    fn full_happy_path_drains_through_identity() {
        let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4));
        assert_eq!(actor.state(), ActorState::WaitingForUpstream);

        let events = Arc::new(Mutex::new(Vec::new()));
        handles.publisher.subscribe(Recorder(events.clone()));
        actor.dispatch(Signal::SubscribePending).unwrap();

        let id = SubscriptionId(0);
        actor.dispatch(Signal::RequestMore(id, 10)).unwrap();

        let upstream = Arc::new(RecordingUpstream::default());
        actor
            .dispatch(Signal::OnSubscribe(Box::new(upstream.clone())))
            .unwrap();
        assert_eq!(actor.state(), ActorState::Running);

        actor.dispatch(Signal::OnNext(1)).unwrap();
        actor.dispatch(Signal::OnNext(2)).unwrap();
        actor.dispatch(Signal::OnComplete).unwrap();
        assert_eq!(actor.state(), ActorState::ShutDown);

        let seen = events.lock().unwrap().clone();
        assert!(matches!(seen[0], Event::Next(1)));
        assert!(matches!(seen[1], Event::Next(2)));
        assert!(matches!(seen[2], Event::Complete));
    }

    #[test]
    fn non_positive_request_fails_the_whole_stage() {
        let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4));
        let events = Arc::new(Mutex::new(Vec::new()));
        handles.publisher.subscribe(Recorder(events.clone()));
        actor.dispatch(Signal::SubscribePending).unwrap();

        let upstream = Arc::new(RecordingUpstream::default());
        actor
            .dispatch(Signal::OnSubscribe(Box::new(upstream)))
            .unwrap();

        actor
            .dispatch(Signal::RequestMore(SubscriptionId(0), 0))
            .unwrap();
        assert_eq!(actor.state(), ActorState::ShutDown);
        assert!(matches!(events.lock().unwrap().last(), Some(Event::Error)));
    }

    #[test]
    fn upstream_error_does_not_recancel_an_already_terminated_upstream() {
        let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4));
        let events = Arc::new(Mutex::new(Vec::new()));
        handles.publisher.subscribe(Recorder(events.clone()));
        actor.dispatch(Signal::SubscribePending).unwrap();

        let upstream = Arc::new(RecordingUpstream::default());
        actor
            .dispatch(Signal::OnSubscribe(Box::new(upstream.clone())))
            .unwrap();

        actor
            .dispatch(Signal::OnError(StageError::Abrupt))
            .unwrap();
        assert_eq!(actor.state(), ActorState::ShutDown);
        assert!(
            !upstream.cancelled.load(Ordering::SeqCst),
            "upstream already reported its own error; cancel() must not be called again"
        );
    }

    #[test]
    fn local_protocol_violation_does_cancel_upstream() {
        let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4));
        handles.publisher.subscribe(Recorder(Arc::new(Mutex::new(Vec::new()))));
        actor.dispatch(Signal::SubscribePending).unwrap();

        let upstream = Arc::new(RecordingUpstream::default());
        actor
            .dispatch(Signal::OnSubscribe(Box::new(upstream.clone())))
            .unwrap();

        actor
            .dispatch(Signal::RequestMore(SubscriptionId(0), 0))
            .unwrap();
        assert!(upstream.cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn signal_before_exposed_publisher_is_a_protocol_violation() {
        // Constructed manually (bypassing `spawn`'s auto-dispatch) to exercise
        // the otherwise-unreachable `WaitingExposedPublisher` rejection path.
        let (upstream_tx, upstream_rx) = mpsc::unbounded_channel::<UpstreamSignal<u32>>();
        let (downstream_tx, downstream_rx) = mpsc::unbounded_channel();
        drop(upstream_tx);
        let mut actor = ProcessorActor::<Identity, u32, u32> {
            state: ActorState::WaitingExposedPublisher,
            settings: settings(4),
            variant: Identity,
            input: Box::new(EmptyInputs),
            output: OutputFanOut::new(4),
            pump: Pump::new(),
            publisher: None,
            downstream_tx: downstream_tx.clone(),
            upstream_rx,
            downstream_rx,
        };
        actor.dispatch(Signal::OnComplete).unwrap();
        assert_eq!(actor.state(), ActorState::ShutDown);
    }
}
