//! Main proxy server implementation

use axum::{
    body::Body,
    extract::{Query, State},
    http::Request,
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::{ProxyHandler, SpeakBody, StreamQuery, TtsBody};
use crate::config::{AppConfig, UpstreamConfig};
use crate::relay::Relay;
use crate::synthesis::STREAM_PATH;

/// Buffered / entity-style synthesis endpoint
pub const TTS_PATH: &str = "/api/cynvoice/tts";
/// Control-plane endpoint returning a playback URL
pub const SPEAK_PATH: &str = "/api/cynvoice/speak";

/// Shared state for the proxy
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub relay: Relay,
}

impl ProxyState {
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let http_client = build_http_client(&config.upstream)?;
        let relay = Relay::new(http_client, Duration::from_secs(config.upstream.timeout_seconds));
        Ok(Self {
            config: Arc::new(config),
            relay,
        })
    }
}

/// Build an HTTP client with TLS configuration
pub fn build_http_client(upstream: &UpstreamConfig) -> Result<reqwest::Client, Box<dyn std::error::Error>> {
    let mut client_builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(upstream.timeout_seconds))
        .pool_max_idle_per_host(upstream.pool_max_idle_per_host);

    // Apply TLS configuration if present
    if let Some(ref tls) = upstream.tls {
        if tls.accept_invalid_certs {
            client_builder = client_builder.danger_accept_invalid_certs(true);
            tracing::warn!("TLS: Accepting invalid certificates (use only for development/testing)");
        }

        if let Some(ref ca_path) = tls.ca_cert_path {
            let ca_cert = std::fs::read(ca_path)?;
            let ca_cert = reqwest::Certificate::from_pem(&ca_cert)?;
            client_builder = client_builder.add_root_certificate(ca_cert);
            tracing::info!("TLS: Loaded custom CA certificate from {}", ca_path);
        }

        // mTLS needs both halves
        if let (Some(cert_path), Some(key_path)) = (&tls.client_cert_path, &tls.client_key_path) {
            let cert_pem = std::fs::read(cert_path)?;
            let key_pem = std::fs::read(key_path)?;

            let identity = reqwest::Identity::from_pem(&[cert_pem, key_pem].concat())?;
            client_builder = client_builder.identity(identity);
            tracing::info!("TLS: Loaded client certificate from {} for mTLS", cert_path);
        }
    }

    Ok(client_builder.build()?)
}

/// Build the router for `state`
pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(STREAM_PATH, get(stream_handler).post(stream_text_handler))
        .route(TTS_PATH, post(tts_handler))
        .route(SPEAK_PATH, post(speak_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Per-request span. The query string carries the text to synthesize, so
/// only the path is recorded.
fn request_span(request: &Request<Body>) -> tracing::Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}

/// Run the proxy server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let public_url = config.server.public_base_url();
    let state = ProxyState::new(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("cynvoice-proxy listening on {}", addr);
    tracing::info!("Playback URLs use {}{}", public_url, STREAM_PATH);

    Ok(axum::serve(listener, app).await?)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

async fn stream_handler(
    State(state): State<ProxyState>,
    Query(query): Query<StreamQuery>,
) -> axum::response::Response {
    ProxyHandler::new(state).handle_stream(query).await
}

async fn stream_text_handler(
    State(state): State<ProxyState>,
    Query(query): Query<StreamQuery>,
    body: Body,
) -> axum::response::Response {
    ProxyHandler::new(state).handle_text_stream(query, body).await
}

async fn tts_handler(State(state): State<ProxyState>, Json(body): Json<TtsBody>) -> axum::response::Response {
    ProxyHandler::new(state).handle_tts(body).await
}

async fn speak_handler(State(state): State<ProxyState>, Json(body): Json<SpeakBody>) -> axum::response::Response {
    ProxyHandler::new(state).handle_speak(body)
}
