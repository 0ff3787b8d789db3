//! Mock upstream server that simulates the TTS synthesis service
//!
//! Serves POST /v1/tts. Tests pre-configure responses via SharedBackendState
//! before each request; with nothing queued the text is echoed back as one
//! `<word>` frame per word.

use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::types::{BackendState, MockResponse, ReceivedRequest, SharedBackendState};

/// Default response when no response is queued: echo the words of the text
fn default_tts_response(text: &str) -> MockResponse {
    MockResponse::audio(
        text.split_whitespace()
            .map(|word| format!("<{word}>").into_bytes())
            .collect(),
    )
}

/// Turn a mock response into a chunked body, honoring delays and failures
fn mock_body(mock: MockResponse) -> Body {
    let delay = Duration::from_millis(mock.chunk_delay_ms);
    let fail_after = mock.fail_after;
    let frames = futures::stream::iter(mock.chunks.into_iter().enumerate()).then(move |(i, chunk)| async move {
        if fail_after.is_some_and(|n| i >= n) {
            return Err(std::io::Error::other("mock upstream reset"));
        }
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(Bytes::from(chunk))
    });
    Body::from_stream(frames)
}

/// Handle POST /v1/tts - serves pre-configured mock responses
async fn handle_tts(State(state): State<SharedBackendState>, Json(body): Json<serde_json::Value>) -> Response {
    let text = body.get("text").and_then(|t| t.as_str()).unwrap_or_default().to_string();

    let mock_response = {
        let mut state = state.lock().unwrap();
        state.received_requests.push(ReceivedRequest {
            path: "/v1/tts".to_string(),
            body,
        });
        state
            .response_queue
            .pop_front()
            .unwrap_or_else(|| default_tts_response(&text))
    };

    Response::builder()
        .status(mock_response.status)
        .header("Content-Type", mock_response.content_type.clone())
        .body(mock_body(mock_response))
        .unwrap()
        .into_response()
}

/// Handle GET /health
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Start the mock upstream server and return the shared state handle
pub async fn start(port: u16) -> anyhow::Result<SharedBackendState> {
    let state: SharedBackendState = std::sync::Arc::new(std::sync::Mutex::new(BackendState::default()));

    let app = Router::new()
        .route("/v1/tts", post(handle_tts))
        .route("/health", get(handle_health))
        .with_state(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind mock upstream to {}: {}", addr, e))?;

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock upstream server failed");
    });

    // Brief pause to let the server start accepting connections
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    Ok(state)
}

/// Helper to configure the next response for /v1/tts
pub fn queue_response(state: &SharedBackendState, response: MockResponse) {
    state.lock().unwrap().response_queue.push_back(response);
}

/// Helper to get all requests received since last clear
pub fn drain_requests(state: &SharedBackendState) -> Vec<ReceivedRequest> {
    let mut s = state.lock().unwrap();
    s.received_requests.drain(..).collect()
}
