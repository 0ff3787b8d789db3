//! JSON body sent to the upstream `/v1/tts` endpoint

use serde::Serialize;

/// Characters of text per upstream generation chunk
pub const CHUNK_LENGTH: u32 = 200;
/// Audio container requested from upstream
pub const AUDIO_FORMAT: &str = "wav";
pub const USE_MEMORY_CACHE: &str = "on";
pub const MAX_NEW_TOKENS: u32 = 1024;
pub const TOP_P: f64 = 0.8;

/// Upstream synthesis payload.
///
/// Only `text`, `reference_id`, `streaming`, `repetition_penalty` and
/// `temperature` vary per request; the rest are fixed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisPayload<'a> {
    pub text: &'a str,
    pub chunk_length: u32,
    pub format: &'static str,
    pub references: [serde_json::Value; 0],
    pub reference_id: &'a str,
    pub seed: Option<u64>,
    pub use_memory_cache: &'static str,
    pub normalize: bool,
    pub streaming: bool,
    pub max_new_tokens: u32,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub temperature: f64,
}

impl<'a> SynthesisPayload<'a> {
    pub fn new(
        text: &'a str,
        voice: &'a str,
        temperature: f64,
        repetition_penalty: f64,
        streaming: bool,
    ) -> Self {
        Self {
            text,
            chunk_length: CHUNK_LENGTH,
            format: AUDIO_FORMAT,
            references: [],
            reference_id: voice,
            seed: None,
            use_memory_cache: USE_MEMORY_CACHE,
            normalize: true,
            streaming,
            max_new_tokens: MAX_NEW_TOKENS,
            top_p: TOP_P,
            repetition_penalty,
            temperature,
        }
    }
}
