//! Streaming relay between the synthesis service and a downstream sink

mod engine;
mod error;
mod sink;
mod upstream;

pub use engine::{AudioBuffer, Relay, RelayOutcome, RelayState, DEFAULT_TIMEOUT};
pub use error::RelayError;
pub use sink::{channel_sink, AudioSink, BodyReceiver, ChannelSink, ChannelSinkHandle, MemorySink, StreamHead};
pub use upstream::{UpstreamAudioChannel, CHUNK_SIZE};
