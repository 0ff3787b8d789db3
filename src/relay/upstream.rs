//! Open upstream response body, read in bounded chunks

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use super::error::RelayError;

/// Largest chunk handed downstream at once
pub const CHUNK_SIZE: usize = 8192;

/// Live audio body from the synthesis endpoint.
///
/// Holds at most one upstream frame. The underlying connection is released by
/// [`close`](Self::close) or on drop, whichever comes first.
pub struct UpstreamAudioChannel {
    endpoint: String,
    body: Option<BoxStream<'static, Result<Bytes, RelayError>>>,
    pending: Bytes,
    bytes_read: u64,
}

impl UpstreamAudioChannel {
    pub fn from_response(endpoint: impl Into<String>, response: reqwest::Response) -> Self {
        let endpoint = endpoint.into();
        let body_endpoint = endpoint.clone();
        let body = response
            .bytes_stream()
            .map(move |frame| frame.map_err(|e| RelayError::from_body_error(&body_endpoint, e)));
        Self::from_stream(endpoint, body)
    }

    pub fn from_stream<S>(endpoint: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, RelayError>> + Send + 'static,
    {
        Self {
            endpoint: endpoint.into(),
            body: Some(stream.boxed()),
            pending: Bytes::new(),
            bytes_read: 0,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Bytes pulled from upstream so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn is_closed(&self) -> bool {
        self.body.is_none()
    }

    /// Next non-empty chunk of at most [`CHUNK_SIZE`] bytes, `None` at end of body.
    ///
    /// Only pulls from upstream when the previous frame is used up.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
        loop {
            if !self.pending.is_empty() {
                let take = self.pending.len().min(CHUNK_SIZE);
                return Ok(Some(self.pending.split_to(take)));
            }

            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };

            match body.next().await {
                Some(Ok(frame)) => {
                    self.bytes_read += frame.len() as u64;
                    self.pending = frame;
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(None),
            }
        }
    }

    /// Release the upstream connection. Idempotent.
    pub fn close(&mut self) {
        self.pending = Bytes::new();
        if let Some(body) = self.body.take() {
            drop(body);
            tracing::debug!(
                endpoint = %self.endpoint,
                bytes_read = self.bytes_read,
                "Upstream audio channel closed"
            );
        }
    }
}

impl Drop for UpstreamAudioChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for UpstreamAudioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamAudioChannel")
            .field("endpoint", &self.endpoint)
            .field("closed", &self.is_closed())
            .field("pending", &self.pending.len())
            .field("bytes_read", &self.bytes_read)
            .finish()
    }
}
