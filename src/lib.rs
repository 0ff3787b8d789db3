//! cynvoice-proxy: streaming relay in front of a text-to-speech service
//!
//! Features:
//! - Layered parameter resolution (per-request, options, config, defaults)
//! - Chunk-by-chunk audio relay with bounded memory per request
//! - Buffered synthesis for callers that want the whole file
//! - Playback URLs for media players that fetch audio themselves

pub mod config;
pub mod logging;
pub mod proxy;
pub mod relay;
pub mod synthesis;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use proxy::run_server;
pub use relay::{Relay, RelayError};
pub use synthesis::{RequestBuilder, SynthesisOverrides, SynthesisRequest};
