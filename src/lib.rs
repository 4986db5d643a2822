//! A reactive-streams processor stage: one upstream subscription, any number
//! of downstream subscribers, demand-driven backpressure throughout.
//!
//! The crate's central type is [`ProcessorActor`](actor::ProcessorActor): a
//! single-threaded actor holding an [`InputBuffer`](input_buffer::InputBuffer)
//! on its upstream side and an [`OutputFanOut`](output_fanout::OutputFanOut)
//! on its downstream side, pumping elements between them through a
//! [`Variant`](variants::Variant) — [`Identity`](variants::Identity),
//! [`Map`](variants::Map), or [`Filter`](variants::Filter) — for as long as
//! both sides report readiness via [`TransferState`](transfer_state::TransferState).
//!
//! ```ignore
//! use stagepump::{actor::ProcessorActor, config::Settings, variants::Map};
//!
//! let (actor, handles) = ProcessorActor::spawn(Map::new(|x: u32| x * 2), Settings::default());
//! tokio::spawn(actor.run());
//! // hand `handles.upstream` to whatever produces elements, and
//! // `handles.publisher` to whatever wants to subscribe.
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod input_buffer;
pub mod output_fanout;
pub(crate) mod pump;
pub mod signal;
pub mod subscription;
pub mod transfer_state;
pub mod variants;

pub use actor::{ActorHandles, ActorState, ProcessorActor};
pub use config::{ConfigError, Settings, SettingsBuilder};
pub use error::{Cause, ProtocolError, StageError};
pub use input_buffer::{InputBuffer, PrimaryInputs, UpstreamHandle};
pub use output_fanout::OutputFanOut;
pub use signal::{DownstreamSignal, Signal, UpstreamSignal};
pub use subscription::{Publisher, Subscriber, Subscription, SubscriptionId};
pub use transfer_state::TransferState;
pub use variants::{Filter, Identity, Map, Variant};
