//! Request handlers for the synthesis endpoints

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::server::ProxyState;
use crate::logging::format_synthesis_log;
use crate::relay::{channel_sink, AudioBuffer, BodyReceiver, ChannelSinkHandle, StreamHead};
use crate::synthesis::{
    collect_text, float_or_default, parse_float_or_default, stream_url, RequestBuilder, SynthesisOverrides,
    SynthesisRequest, TextStreamError, DEFAULT_REPETITION_PENALTY, DEFAULT_TEMPERATURE,
};

const STREAMING_ERROR: &str = "Streaming error";
const TTS_ERROR: &str = "TTS error";

/// Query string of the streaming endpoint. Everything is optional.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub text: Option<String>,
    pub voice: Option<String>,
    pub temperature: Option<String>,
    pub repetition_penalty: Option<String>,
    pub api_url: Option<String>,
}

impl StreamQuery {
    fn overrides(&self) -> SynthesisOverrides {
        SynthesisOverrides {
            voice: self.voice.clone(),
            temperature: self
                .temperature
                .as_deref()
                .map(|raw| parse_float_or_default(raw, DEFAULT_TEMPERATURE)),
            repetition_penalty: self
                .repetition_penalty
                .as_deref()
                .map(|raw| parse_float_or_default(raw, DEFAULT_REPETITION_PENALTY)),
            streaming: Some(true),
            endpoint_url: self.api_url.clone(),
        }
    }
}

/// Body of the entity-style synthesis endpoint
#[derive(Debug, Deserialize)]
pub struct TtsBody {
    pub message: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub temperature: Option<Value>,
    #[serde(default)]
    pub repetition_penalty: Option<Value>,
    #[serde(default)]
    pub streaming: Option<bool>,
}

impl TtsBody {
    fn overrides(&self) -> SynthesisOverrides {
        SynthesisOverrides {
            voice: self.voice.clone(),
            temperature: numeric_override(self.temperature.as_ref(), DEFAULT_TEMPERATURE),
            repetition_penalty: numeric_override(self.repetition_penalty.as_ref(), DEFAULT_REPETITION_PENALTY),
            streaming: self.streaming,
            endpoint_url: None,
        }
    }
}

/// One entity id, a comma-separated list, or a JSON list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntityIds {
    One(String),
    Many(Vec<String>),
}

impl EntityIds {
    pub fn into_vec(self) -> Vec<String> {
        let ids = match self {
            Self::One(joined) => joined.split(',').map(str::to_string).collect(),
            Self::Many(ids) => ids,
        };
        ids.into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// Body of the speak endpoint
#[derive(Debug, Deserialize)]
pub struct SpeakBody {
    pub entity_ids: EntityIds,
    pub message: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub temperature: Option<Value>,
    #[serde(default)]
    pub repetition_penalty: Option<Value>,
}

impl SpeakBody {
    fn overrides(&self) -> SynthesisOverrides {
        SynthesisOverrides {
            voice: self.voice.clone(),
            temperature: numeric_override(self.temperature.as_ref(), DEFAULT_TEMPERATURE),
            repetition_penalty: numeric_override(self.repetition_penalty.as_ref(), DEFAULT_REPETITION_PENALTY),
            streaming: Some(true),
            endpoint_url: None,
        }
    }
}

/// Play-media instruction handed back to the caller
#[derive(Debug, Serialize)]
pub struct PlayMediaRequest {
    pub entity_ids: Vec<String>,
    pub media_content_id: String,
    pub media_content_type: &'static str,
}

/// Numbers and numeric strings are accepted; anything else present means the default
fn numeric_override(value: Option<&Value>, default: f64) -> Option<f64> {
    match value? {
        Value::Null => None,
        Value::Number(n) => Some(n.as_f64().map_or(default, |f| float_or_default(f, default))),
        Value::String(raw) => Some(parse_float_or_default(raw, default)),
        _ => Some(default),
    }
}

fn error_response(message: &'static str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain")],
        message,
    )
        .into_response()
}

fn audio_response(buffer: AudioBuffer) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, format!("audio/{}", buffer.format))],
        buffer.data,
    )
        .into_response()
}

fn stream_response(head: StreamHead, body: BodyReceiver) -> Response {
    let mut builder = Response::builder().status(head.status);
    for (name, value) in head.headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::from_stream(body)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build streaming response");
        error_response(STREAMING_ERROR)
    })
}

/// Handles one synthesis request against the shared proxy state
pub struct ProxyHandler {
    state: ProxyState,
}

impl ProxyHandler {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    fn builder(&self) -> RequestBuilder<'_> {
        RequestBuilder::from_config(&self.state.config.synthesis)
    }

    /// Streaming endpoint: always streams, a missing text is synthesized as empty
    pub async fn handle_stream(&self, query: StreamQuery) -> Response {
        let overrides = query.overrides();
        let request = self.builder().build(query.text.unwrap_or_default(), &overrides);
        tracing::info!("{}", format_synthesis_log(&request));
        self.respond_streaming(request).await
    }

    /// Streaming endpoint fed by a request body that may arrive in pieces.
    ///
    /// The whole text is collected before the upstream is called; the other
    /// query parameters apply as for GET.
    pub async fn handle_text_stream(&self, query: StreamQuery, body: Body) -> Response {
        let text = match collect_text(body.into_data_stream()).await {
            Ok(text) => text,
            Err(TextStreamError::TooLarge) => {
                return (StatusCode::PAYLOAD_TOO_LARGE, "text too large").into_response();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read streamed text");
                return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
            }
        };

        let overrides = query.overrides();
        let request = self.builder().build(text, &overrides);
        tracing::info!("{}", format_synthesis_log(&request));
        self.respond_streaming(request).await
    }

    /// Entity-style endpoint: buffered unless streaming resolves to true
    pub async fn handle_tts(&self, body: TtsBody) -> Response {
        let overrides = body.overrides();
        let request = self.builder().build(body.message, &overrides);
        tracing::info!("{}", format_synthesis_log(&request));

        if request.streaming() {
            self.respond_streaming(request).await
        } else {
            self.respond_buffered(request).await
        }
    }

    /// Resolve parameters and return the streaming URL for a playback target.
    ///
    /// Nothing is synthesized here; the target fetches the URL itself.
    pub fn handle_speak(&self, body: SpeakBody) -> Response {
        let overrides = body.overrides();
        let entity_ids = body.entity_ids.into_vec();
        if entity_ids.is_empty() {
            return (StatusCode::BAD_REQUEST, "entity_ids must not be empty").into_response();
        }

        let request = self.builder().build(body.message, &overrides);
        let base_url = self.state.config.server.public_base_url();
        match stream_url(&base_url, &request) {
            Ok(media_content_id) => {
                tracing::info!(
                    entities = entity_ids.len(),
                    "Speak {}",
                    format_synthesis_log(&request)
                );
                tracing::debug!(base_url = %base_url, "Playback URL built");
                Json(PlayMediaRequest {
                    entity_ids,
                    media_content_id,
                    media_content_type: "music",
                })
                .into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, base_url = %base_url, "Failed to build playback URL");
                error_response(TTS_ERROR)
            }
        }
    }

    async fn respond_buffered(&self, request: SynthesisRequest) -> Response {
        match self.state.relay.fetch_buffered(&request).await {
            Ok(buffer) => audio_response(buffer),
            Err(_) => error_response(TTS_ERROR),
        }
    }

    /// Hand the relay a channel sink and answer with whatever it commits.
    ///
    /// If the relay fails before committing a head the client gets a plain 500.
    async fn respond_streaming(&self, request: SynthesisRequest) -> Response {
        let relay = self.state.relay.clone();
        let (mut sink, handle) = channel_sink();
        let ChannelSinkHandle { head, body } = handle;

        let task = tokio::spawn(async move {
            let outcome = relay.relay(&request, &mut sink).await;
            if let Ok(ref outcome) = outcome {
                if !outcome.is_complete() {
                    tracing::warn!(outcome = ?outcome, "Stream ended early");
                }
            }
            outcome
        });

        match head.await {
            Ok(head) => stream_response(head, body),
            Err(_) => {
                match task.await {
                    Ok(Err(e)) => tracing::debug!(error = %e, "No response head committed"),
                    Ok(Ok(outcome)) => {
                        tracing::warn!(outcome = ?outcome, "Relay finished without a response head")
                    }
                    Err(e) => tracing::error!(error = %e, "Relay task failed"),
                }
                error_response(STREAMING_ERROR)
            }
        }
    }
}
