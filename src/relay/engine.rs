//! Upstream POST and chunk-by-chunk forwarding

use bytes::Bytes;
use reqwest::header;
use std::time::Duration;
use tracing::Instrument;

use super::error::RelayError;
use super::sink::{AudioSink, StreamHead};
use super::upstream::UpstreamAudioChannel;
use crate::logging::format_synthesis_log;
use crate::synthesis::SynthesisRequest;

/// Total budget for one upstream operation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Fully buffered audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Container format, always "wav"
    pub format: &'static str,
    pub data: Bytes,
}

/// Progress of one streaming relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    UpstreamRequested,
    UpstreamConnected,
    DownstreamCommitted,
    Forwarding,
    Drained,
    Closed,
}

/// How a relay ended
#[derive(Debug)]
pub enum RelayOutcome {
    /// Non-streaming mode: the whole body
    Buffered(AudioBuffer),
    /// Every upstream chunk reached the sink, followed by end-of-stream
    Streamed { chunks: usize, bytes: u64 },
    /// Stopped after the upstream connected; `state` is where it stopped
    Interrupted {
        state: RelayState,
        chunks: usize,
        bytes: u64,
        error: RelayError,
    },
}

impl RelayOutcome {
    pub fn is_complete(&self) -> bool {
        !matches!(self, Self::Interrupted { .. })
    }
}

/// Relays synthesis requests to the upstream service.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Relay {
    client: reqwest::Client,
    timeout: Duration,
}

impl Relay {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// POST the request upstream and return the open body.
    ///
    /// Fails without a channel on connect errors, timeouts and non-2xx statuses.
    pub async fn open(&self, request: &SynthesisRequest) -> Result<UpstreamAudioChannel, RelayError> {
        let endpoint = request.endpoint_url();
        tracing::debug!(endpoint = %endpoint, "{}", format_synthesis_log(request));

        let response = self
            .client
            .post(endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "*/*")
            .timeout(self.timeout)
            .json(&request.payload())
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.ok();
            let err = RelayError::status(endpoint, status.as_u16(), body.as_deref());
            if let RelayError::UpstreamStatus { ref excerpt, .. } = err {
                tracing::error!(
                    status = %status,
                    excerpt = ?excerpt,
                    "Upstream returned error response"
                );
            }
            return Err(err);
        }

        tracing::debug!(status = %status, "Upstream connected");
        Ok(UpstreamAudioChannel::from_response(endpoint, response))
    }

    /// Non-streaming mode: read the entire body into memory
    pub async fn fetch_buffered(&self, request: &SynthesisRequest) -> Result<AudioBuffer, RelayError> {
        let span = relay_span(request);
        async {
            let mut channel = self.open(request).await?;
            let mut data = Vec::new();
            let result = loop {
                match channel.next_chunk().await {
                    Ok(Some(chunk)) => data.extend_from_slice(&chunk),
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            };
            channel.close();

            match result {
                Ok(()) => {
                    tracing::info!(bytes = data.len(), "Buffered synthesis complete");
                    Ok(AudioBuffer {
                        format: "wav",
                        data: Bytes::from(data),
                    })
                }
                Err(e) => {
                    tracing::error!(error = %e, "Buffered synthesis failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run one request. Streaming requests go through `sink`; non-streaming
    /// requests return the buffered body and leave `sink` untouched.
    ///
    /// `Err` means nothing was committed downstream.
    pub async fn relay<S>(&self, request: &SynthesisRequest, sink: &mut S) -> Result<RelayOutcome, RelayError>
    where
        S: AudioSink + ?Sized,
    {
        if !request.streaming() {
            return self.fetch_buffered(request).await.map(RelayOutcome::Buffered);
        }

        let span = relay_span(request);
        async {
            tracing::trace!(state = ?RelayState::Idle, "Relay started");
            tracing::trace!(state = ?RelayState::UpstreamRequested, "Opening upstream");
            let result = match self.open(request).await {
                Ok(channel) => Self::forward(channel, sink).await,
                Err(e) => Err(e),
            };
            if let Err(ref e) = result {
                tracing::error!(error = %e, "Streaming relay failed before commit");
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Commit the sink and forward every chunk of `channel` in order.
    ///
    /// The head is committed only once the first chunk (or a clean end of
    /// body) has arrived, so a timeout or body failure before the first byte
    /// returns `Err` with the sink untouched. After that, the next chunk is
    /// pulled only once the previous one was written. The channel is closed
    /// on every path before this returns.
    pub async fn forward<S>(mut channel: UpstreamAudioChannel, sink: &mut S) -> Result<RelayOutcome, RelayError>
    where
        S: AudioSink + ?Sized,
    {
        let mut state = RelayState::UpstreamConnected;
        let mut chunks = 0usize;
        let mut bytes = 0u64;

        let mut next = match channel.next_chunk().await {
            Ok(first) => first,
            Err(e) => {
                close(&mut channel);
                return Err(e);
            }
        };

        if let Err(error) = sink.prepare(StreamHead::audio_wav()).await {
            close(&mut channel);
            tracing::warn!(error = %error, "Downstream gone before response head");
            return Ok(RelayOutcome::Interrupted {
                state,
                chunks,
                bytes,
                error,
            });
        }
        state = RelayState::DownstreamCommitted;
        tracing::trace!(state = ?state, "Response head committed");

        let failure = loop {
            let Some(chunk) = next.take() else {
                break None;
            };
            state = RelayState::Forwarding;

            let len = chunk.len() as u64;
            if let Err(e) = sink.write_chunk(chunk).await {
                break Some(e);
            }
            chunks += 1;
            bytes += len;

            next = match channel.next_chunk().await {
                Ok(chunk) => chunk,
                Err(e) => break Some(e),
            };
        };

        close(&mut channel);

        let outcome = match failure {
            None => {
                state = RelayState::Drained;
                tracing::trace!(state = ?state, "Upstream drained");
                if let Err(error) = sink.finish().await {
                    tracing::warn!(error = %error, "Failed to signal end of stream");
                    return Ok(RelayOutcome::Interrupted {
                        state,
                        chunks,
                        bytes,
                        error,
                    });
                }
                tracing::info!(chunks, bytes, "Streaming relay complete");
                RelayOutcome::Streamed { chunks, bytes }
            }
            Some(error) if error.is_downstream() => {
                tracing::warn!(chunks, bytes, error = %error, "Client disconnected mid-stream");
                RelayOutcome::Interrupted {
                    state,
                    chunks,
                    bytes,
                    error,
                }
            }
            Some(error) => {
                tracing::error!(chunks, bytes, error = %error, "Upstream failed mid-stream");
                sink.abort(&error).await;
                RelayOutcome::Interrupted {
                    state,
                    chunks,
                    bytes,
                    error,
                }
            }
        };
        Ok(outcome)
    }
}

fn close(channel: &mut UpstreamAudioChannel) {
    channel.close();
    tracing::trace!(state = ?RelayState::Closed, "Upstream released");
}

fn relay_span(request: &SynthesisRequest) -> tracing::Span {
    tracing::info_span!(
        "relay",
        relay_id = %uuid::Uuid::new_v4(),
        endpoint = %request.endpoint_url(),
        streaming = request.streaming(),
    )
}
