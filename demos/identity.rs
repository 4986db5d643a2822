//! Wires a `stagepump` stage end to end: a small in-memory producer acting
//! as upstream, an `Identity` transform, and a subscriber that prints what
//! it receives. Run with `cargo run --example identity`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use stagepump::{
    ActorState, Identity, ProcessorActor, Settings, StageError, Subscriber, Subscription,
    UpstreamHandle, UpstreamSignal,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;

/// Upstream handle backed by a fixed in-memory sequence. `request(n)` pushes
/// up to `n` buffered elements as `onNext`, emitting `onComplete` once
/// exhausted.
struct VecProducer {
    remaining: Mutex<VecDeque<u32>>,
    upstream: UnboundedSender<UpstreamSignal<u32>>,
}

impl UpstreamHandle for Arc<VecProducer> {
    fn request(&self, n: u64) {
        let mut remaining = self.remaining.lock().expect("producer mutex poisoned");
        for _ in 0..n {
            match remaining.pop_front() {
                Some(item) => {
                    let _ = self.upstream.send(UpstreamSignal::OnNext(item));
                }
                None => {
                    let _ = self.upstream.send(UpstreamSignal::OnComplete);
                    break;
                }
            }
        }
    }

    fn cancel(&self) {
        self.remaining.lock().expect("producer mutex poisoned").clear();
    }
}

struct PrintingSubscriber {
    done: Arc<Notify>,
}

impl Subscriber<u32> for PrintingSubscriber {
    fn on_subscribe(&self, subscription: Subscription<u32>) {
        subscription.request(8);
    }

    fn on_next(&self, item: u32) {
        println!("received {item}");
    }

    fn on_complete(&self) {
        println!("stage completed");
        self.done.notify_one();
    }

    fn on_error(&self, cause: StageError) {
        eprintln!("stage failed: {cause}");
        self.done.notify_one();
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let settings = Settings::builder()
        .initial_input_buffer_size(4)
        .max_input_buffer_size(4)
        .initial_fan_out_buffer_size(4)
        .max_fan_out_buffer_size(4)
        .build()
        .expect("demo settings are valid");

    let (actor, handles) = ProcessorActor::spawn(Identity, settings);
    assert_eq!(actor.state(), ActorState::WaitingForUpstream);

    let producer = Arc::new(VecProducer {
        remaining: Mutex::new((0..20).collect()),
        upstream: handles.upstream.clone(),
    });

    let done = Arc::new(Notify::new());
    handles.publisher.subscribe(PrintingSubscriber { done: done.clone() });

    handles
        .upstream
        .send(UpstreamSignal::OnSubscribe(Box::new(producer)))
        .expect("actor mailbox open");

    let run = tokio::spawn(actor.run());
    done.notified().await;
    run.await.expect("actor task panicked");
}
