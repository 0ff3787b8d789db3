//! In-process synthesis upstream for tests

use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every payload it receives.
///
/// The text selects the behavior:
/// - "overloaded" answers 503
/// - "slow" stalls for five seconds before the headers
/// - "stall" sends the headers, then never produces a byte
/// - "reset" sends the headers, then fails the body before the first byte
/// - "broken" sends one frame then resets
/// - "paced" streams 1 KiB frames every 50ms until the connection goes away,
///   counting pulls in `pulls` and setting `released` once the body is dropped
/// - anything else streams one `<word>` frame per word
#[derive(Clone, Default)]
pub(crate) struct MockUpstream {
    pub(crate) received: Arc<Mutex<Vec<serde_json::Value>>>,
    pub(crate) pulls: Arc<AtomicUsize>,
    pub(crate) released: Arc<AtomicBool>,
}

impl MockUpstream {
    pub(crate) fn last_payload(&self) -> serde_json::Value {
        self.received.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

/// Sets the flag when the response body it travels with is dropped
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn audio(body: Body) -> Response {
    Response::builder()
        .header("content-type", "audio/wav")
        .body(body)
        .unwrap()
}

async fn tts_handler(State(mock): State<MockUpstream>, Json(body): Json<serde_json::Value>) -> Response {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    mock.received.lock().unwrap().push(body);
    match text.as_str() {
        "overloaded" => (StatusCode::SERVICE_UNAVAILABLE, "model overloaded").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, "late").into_response()
        }
        "stall" => audio(Body::from_stream(
            futures::stream::pending::<Result<Bytes, std::io::Error>>(),
        )),
        "reset" => audio(Body::from_stream(futures::stream::iter(vec![Err::<Bytes, _>(
            std::io::Error::other("synthesis crashed"),
        )]))),
        "broken" => {
            let frames: Vec<Result<Bytes, std::io::Error>> = vec![
                Ok(Bytes::from_static(b"<broken>")),
                Err(std::io::Error::other("synthesis crashed")),
            ];
            audio(Body::from_stream(futures::stream::iter(frames)))
        }
        "paced" => {
            let pulls = mock.pulls.clone();
            let guard = ReleaseGuard(mock.released.clone());
            let frames = futures::stream::unfold((0usize, guard), move |(sent, guard)| {
                let pulls = pulls.clone();
                async move {
                    pulls.fetch_add(1, Ordering::SeqCst);
                    if sent > 0 {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    let frame = Ok::<_, std::io::Error>(Bytes::from(vec![b'a'; 1024]));
                    Some((frame, (sent + 1, guard)))
                }
            });
            audio(Body::from_stream(frames))
        }
        _ => {
            let frames: Vec<Result<Bytes, std::io::Error>> = text
                .split(' ')
                .map(|word| Ok(Bytes::from(format!("<{word}>"))))
                .collect();
            audio(Body::from_stream(futures::stream::iter(frames)))
        }
    }
}

/// Serve the mock on an ephemeral port; returns its `/v1/tts` URL
pub(crate) async fn start_mock_upstream() -> (String, MockUpstream) {
    let mock = MockUpstream::default();
    let app = Router::new()
        .route("/v1/tts", post(tts_handler))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1/tts"), mock)
}
