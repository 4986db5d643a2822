//! End-to-end scenario tests driving `ProcessorActor::dispatch` directly,
//! one [`Signal`] at a time, so each test is deterministic without needing a
//! live tokio runtime.

use stagepump::{
    ActorState, Filter, Identity, Map, ProcessorActor, Settings, Signal, StageError, Subscriber,
    Subscription, SubscriptionId, UpstreamHandle,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingUpstream {
    requested: AtomicU64,
    request_calls: AtomicU64,
    cancelled: AtomicBool,
}

impl UpstreamHandle for Arc<RecordingUpstream> {
    fn request(&self, n: u64) {
        self.requested.fetch_add(n, Ordering::SeqCst);
        self.request_calls.fetch_add(1, Ordering::SeqCst);
    }
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Event {
    Next(u32),
    Complete,
    Error(String),
}

#[derive(Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    id: Arc<Mutex<Option<SubscriptionId>>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// The id assigned by `register_subscriber`, captured from
    /// `on_subscribe`. Tests use this to address `Signal::RequestMore`/
    /// `Signal::Cancel` at this specific subscriber without needing direct
    /// access to `SubscriptionId`'s internals.
    fn id(&self) -> SubscriptionId {
        self.id.lock().unwrap().expect("on_subscribe was not called yet")
    }
}

impl Subscriber<u32> for Recorder {
    fn on_subscribe(&self, subscription: Subscription<u32>) {
        *self.id.lock().unwrap() = Some(subscription.id());
    }
    fn on_next(&self, item: u32) {
        self.events.lock().unwrap().push(Event::Next(item));
    }
    fn on_complete(&self) {
        self.events.lock().unwrap().push(Event::Complete);
    }
    fn on_error(&self, cause: StageError) {
        self.events.lock().unwrap().push(Event::Error(cause.to_string()));
    }
}

fn settings(initial: u64, max: u64) -> Settings {
    Settings::builder()
        .initial_input_buffer_size(initial)
        .max_input_buffer_size(max)
        .initial_fan_out_buffer_size(max)
        .max_fan_out_buffer_size(max)
        .build()
        .expect("test settings are valid")
}

/// Scenario A: construction issues exactly the prefetch `request`, and
/// subsequent batches are requested at half of `max_input_buffer_size`.
#[test]
fn scenario_a_prefetch_and_batched_requests() {
    let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4, 4));
    let recorder = Arc::new(Recorder::default());
    handles.publisher.subscribe(CloneRecorder(recorder.clone()));
    actor.dispatch(Signal::SubscribePending).unwrap();
    actor.dispatch(Signal::RequestMore(recorder.id(), 100)).unwrap();

    let upstream = Arc::new(RecordingUpstream::default());
    actor
        .dispatch(Signal::OnSubscribe(Box::new(upstream.clone())))
        .unwrap();
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 4);
    assert_eq!(upstream.request_calls.load(Ordering::SeqCst), 1);

    upstream.requested.store(0, Ordering::SeqCst);
    upstream.request_calls.store(0, Ordering::SeqCst);

    for v in 0..4 {
        actor.dispatch(Signal::OnNext(v)).unwrap();
    }
    // B = max(1, 4/2) = 2: a new batch request fires after 2 dequeues.
    assert_eq!(upstream.request_calls.load(Ordering::SeqCst), 2);
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 4);
    assert_eq!(recorder.events().len(), 4);
}

/// A downstream subscriber with zero demand does not receive elements until
/// it requests some; once it does, buffered elements are replayed in order.
#[test]
fn backpressure_holds_elements_until_requested() {
    let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4, 4));
    let recorder = Arc::new(Recorder::default());
    handles.publisher.subscribe(CloneRecorder(recorder.clone()));
    actor.dispatch(Signal::SubscribePending).unwrap();

    let upstream = Arc::new(RecordingUpstream::default());
    actor
        .dispatch(Signal::OnSubscribe(Box::new(upstream)))
        .unwrap();

    actor.dispatch(Signal::OnNext(1)).unwrap();
    actor.dispatch(Signal::OnNext(2)).unwrap();
    assert!(recorder.events().is_empty(), "no demand yet: nothing delivered");

    actor.dispatch(Signal::RequestMore(recorder.id(), 2)).unwrap();
    assert_eq!(recorder.events(), vec![Event::Next(1), Event::Next(2)]);
}

/// Two subscribers pace independently: a slow one lagging behind a fast one
/// eventually catches up on its own schedule, and cancelling it does not
/// affect the other.
#[test]
fn fan_out_subscribers_pace_independently() {
    let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(8, 8));

    let fast = Arc::new(Recorder::default());
    let slow = Arc::new(Recorder::default());
    handles.publisher.subscribe(CloneRecorder(fast.clone()));
    handles.publisher.subscribe(CloneRecorder(slow.clone()));
    actor.dispatch(Signal::SubscribePending).unwrap();

    let fast_id = fast.id();
    let slow_id = slow.id();

    let upstream = Arc::new(RecordingUpstream::default());
    actor
        .dispatch(Signal::OnSubscribe(Box::new(upstream)))
        .unwrap();

    actor.dispatch(Signal::RequestMore(fast_id, 10)).unwrap();
    actor.dispatch(Signal::OnNext(1)).unwrap();
    actor.dispatch(Signal::OnNext(2)).unwrap();

    assert_eq!(fast.events(), vec![Event::Next(1), Event::Next(2)]);
    assert!(slow.events().is_empty());

    // Slow subscriber finally asks for demand and catches up from the buffer.
    actor.dispatch(Signal::RequestMore(slow_id, 10)).unwrap();
    assert_eq!(slow.events(), vec![Event::Next(1), Event::Next(2)]);

    actor.dispatch(Signal::Cancel(fast_id)).unwrap();
    actor.dispatch(Signal::OnNext(3)).unwrap();
    assert_eq!(fast.events().len(), 2, "cancelled subscriber gets nothing further");
    assert_eq!(slow.events(), vec![Event::Next(1), Event::Next(2), Event::Next(3)]);
}

/// Upstream completing while output still has live, caught-up subscribers
/// drains into `Flushing` and delivers `onComplete` once drained, without
/// requiring a further round trip.
#[test]
fn graceful_completion_flushes_then_shuts_down() {
    let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4, 4));
    let recorder = Arc::new(Recorder::default());
    handles.publisher.subscribe(CloneRecorder(recorder.clone()));
    actor.dispatch(Signal::SubscribePending).unwrap();
    actor.dispatch(Signal::RequestMore(recorder.id(), 10)).unwrap();

    let upstream = Arc::new(RecordingUpstream::default());
    actor
        .dispatch(Signal::OnSubscribe(Box::new(upstream)))
        .unwrap();

    actor.dispatch(Signal::OnNext(1)).unwrap();
    actor.dispatch(Signal::OnComplete).unwrap();

    assert_eq!(actor.state(), ActorState::ShutDown);
    assert_eq!(recorder.events(), vec![Event::Next(1), Event::Complete]);
}

/// A subscriber joining after the stage has already shut down receives an
/// immediate terminal signal instead of a live subscription.
#[test]
fn late_subscriber_after_shutdown_gets_immediate_terminal_signal() {
    let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4, 4));
    let upstream = Arc::new(RecordingUpstream::default());
    actor
        .dispatch(Signal::OnSubscribe(Box::new(upstream)))
        .unwrap();
    actor.dispatch(Signal::OnComplete).unwrap();
    assert_eq!(actor.state(), ActorState::ShutDown);

    let late = Arc::new(Recorder::default());
    handles.publisher.subscribe(CloneRecorder(late.clone()));
    // The stage is already shut down, but a subscriber joining the exposed
    // publisher still gets a graceful terminal signal rather than silence.
    actor.dispatch(Signal::SubscribePending).unwrap();
    assert_eq!(late.events(), vec![Event::Complete]);
}

/// `request(0)` is a protocol violation that fails the whole stage, not just
/// the offending subscriber.
#[test]
fn non_positive_request_fails_whole_stage() {
    let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4, 4));
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    handles.publisher.subscribe(CloneRecorder(a.clone()));
    handles.publisher.subscribe(CloneRecorder(b.clone()));
    actor.dispatch(Signal::SubscribePending).unwrap();

    let upstream = Arc::new(RecordingUpstream::default());
    actor
        .dispatch(Signal::OnSubscribe(Box::new(upstream)))
        .unwrap();

    actor.dispatch(Signal::RequestMore(a.id(), 0)).unwrap();

    assert_eq!(actor.state(), ActorState::ShutDown);
    assert!(matches!(a.events().last(), Some(Event::Error(_))));
    assert!(matches!(b.events().last(), Some(Event::Error(_))));
}

/// Upstream `onError` propagates verbatim to every live subscriber.
#[test]
fn upstream_error_propagates_to_all_subscribers() {
    let (mut actor, handles) = ProcessorActor::<Identity, u32, u32>::spawn(Identity, settings(4, 4));
    let recorder = Arc::new(Recorder::default());
    handles.publisher.subscribe(CloneRecorder(recorder.clone()));
    actor.dispatch(Signal::SubscribePending).unwrap();

    let upstream = Arc::new(RecordingUpstream::default());
    actor
        .dispatch(Signal::OnSubscribe(Box::new(upstream)))
        .unwrap();

    #[derive(Debug, thiserror::Error)]
    #[error("sensor disconnected")]
    struct SensorDisconnected;

    let cause: stagepump::Cause = Arc::new(SensorDisconnected);
    actor
        .dispatch(Signal::OnError(StageError::upstream(cause)))
        .unwrap();

    assert_eq!(actor.state(), ActorState::ShutDown);
    assert!(matches!(recorder.events().last(), Some(Event::Error(msg)) if msg.contains("sensor disconnected")));
}

/// `Map` applies the transform to every element; `Filter` drops elements
/// that fail the predicate without consuming downstream demand for them.
#[test]
fn map_and_filter_variants_transform_as_expected() {
    let (mut map_actor, map_handles) =
        ProcessorActor::<Map<u32, u32, _>, u32, u32>::spawn(Map::new(|x: u32| x * 10), settings(4, 4));
    let map_recorder = Arc::new(Recorder::default());
    map_handles.publisher.subscribe(CloneRecorder(map_recorder.clone()));
    map_actor.dispatch(Signal::SubscribePending).unwrap();
    map_actor.dispatch(Signal::RequestMore(map_recorder.id(), 10)).unwrap();
    let up = Arc::new(RecordingUpstream::default());
    map_actor.dispatch(Signal::OnSubscribe(Box::new(up))).unwrap();
    map_actor.dispatch(Signal::OnNext(3)).unwrap();
    assert_eq!(map_recorder.events(), vec![Event::Next(30)]);

    let (mut filter_actor, filter_handles) = ProcessorActor::<Filter<u32, _>, u32, u32>::spawn(
        Filter::new(|x: &u32| x % 2 == 0),
        settings(4, 4),
    );
    let filter_recorder = Arc::new(Recorder::default());
    filter_handles.publisher.subscribe(CloneRecorder(filter_recorder.clone()));
    filter_actor.dispatch(Signal::SubscribePending).unwrap();
    filter_actor
        .dispatch(Signal::RequestMore(filter_recorder.id(), 10))
        .unwrap();
    let up2 = Arc::new(RecordingUpstream::default());
    filter_actor
        .dispatch(Signal::OnSubscribe(Box::new(up2)))
        .unwrap();
    filter_actor.dispatch(Signal::OnNext(3)).unwrap();
    filter_actor.dispatch(Signal::OnNext(4)).unwrap();
    assert_eq!(filter_recorder.events(), vec![Event::Next(4)]);
}

/// Wraps `Recorder` so it can be registered more than once without moving
/// the shared event log — `Subscriber` requires `'static` ownership, so each
/// registration gets its own handle pointing at the same `Arc`.
struct CloneRecorder(Arc<Recorder>);

impl Subscriber<u32> for CloneRecorder {
    fn on_subscribe(&self, subscription: Subscription<u32>) {
        self.0.on_subscribe(subscription);
    }
    fn on_next(&self, item: u32) {
        self.0.on_next(item);
    }
    fn on_complete(&self) {
        self.0.on_complete();
    }
    fn on_error(&self, cause: StageError) {
        self.0.on_error(cause);
    }
}
