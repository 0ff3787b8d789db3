//! Shared types for the e2e test framework

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A mock response the upstream will serve for the next request to /v1/tts
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    /// Body frames, sent in order
    pub chunks: Vec<Vec<u8>>,
    pub content_type: String,
    /// Pause before each frame after the first
    pub chunk_delay_ms: u64,
    /// Reset the connection after this many frames
    pub fail_after: Option<usize>,
}

impl MockResponse {
    /// Audio body split into the given frames
    pub fn audio(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status: 200,
            chunks,
            content_type: "audio/wav".to_string(),
            chunk_delay_ms: 0,
            fail_after: None,
        }
    }

    /// Audio frames spaced out in time, like a model producing speech
    pub fn slow_audio(chunks: Vec<Vec<u8>>, chunk_delay_ms: u64) -> Self {
        Self {
            chunk_delay_ms,
            ..Self::audio(chunks)
        }
    }

    /// Sends `sent` frames then breaks the connection
    pub fn broken(chunks: Vec<Vec<u8>>, sent: usize) -> Self {
        Self {
            fail_after: Some(sent),
            ..Self::audio(chunks)
        }
    }

    /// Create an error response
    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            chunks: vec![body.into().into_bytes()],
            content_type: "application/json".to_string(),
            chunk_delay_ms: 0,
            fail_after: None,
        }
    }
}

/// Shared state for the mock upstream server
#[derive(Debug, Default)]
pub struct BackendState {
    /// Queue of responses to serve - tests push responses, upstream pops and serves them
    pub response_queue: VecDeque<MockResponse>,
    /// All requests received by the upstream (for inspection)
    pub received_requests: Vec<ReceivedRequest>,
}

/// A request received by the mock upstream
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub body: serde_json::Value,
}

pub type SharedBackendState = Arc<Mutex<BackendState>>;

/// Result of a buffered proxy request
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl ProxyResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
            .map_err(|e| anyhow::anyhow!("Proxy response is not valid JSON: {}: {}", e, self.text()))
    }
}

/// Result of a streaming proxy request - every body frame as received
#[derive(Debug)]
pub struct StreamingResponse {
    pub status: u16,
    pub content_type: String,
    pub cache_control: String,
    pub chunks: Vec<Vec<u8>>,
    /// Arrival of each frame, in milliseconds since the request was sent
    pub arrivals_ms: Vec<u64>,
    /// Milliseconds from sending the request to the first body frame
    pub first_chunk_ms: Option<u64>,
    /// Milliseconds from sending the request to end of body
    pub total_ms: u64,
    /// False when the body ended with a transport error
    pub complete: bool,
}

impl StreamingResponse {
    /// All frames concatenated
    pub fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body()).into_owned()
    }

    pub fn timing(&self) -> StreamTiming {
        StreamTiming {
            first_chunk_ms: self.first_chunk_ms,
            total_ms: self.total_ms,
            chunks: self.chunks.len(),
            bytes: self.chunks.iter().map(Vec::len).sum(),
            complete: self.complete,
        }
    }
}

/// How one audio stream looked from the client side
#[derive(Debug, Clone)]
pub struct StreamTiming {
    pub first_chunk_ms: Option<u64>,
    pub total_ms: u64,
    pub chunks: usize,
    pub bytes: usize,
    pub complete: bool,
}

/// Result of a single test case
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Audio streams the test read, in order
    pub streams: Vec<StreamTiming>,
}
