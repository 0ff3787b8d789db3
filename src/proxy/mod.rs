//! HTTP proxy server

mod handler;
pub mod server;

pub use handler::{EntityIds, PlayMediaRequest, ProxyHandler, SpeakBody, StreamQuery, TtsBody};
pub use server::{build_router, run_server, ProxyState, SPEAK_PATH, TTS_PATH};
