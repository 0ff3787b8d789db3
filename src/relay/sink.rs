//! Downstream audio sinks

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::SinkExt;
use tokio::sync::oneshot;

use super::error::RelayError;

/// Status line and headers committed before the first audio byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHead {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
}

impl StreamHead {
    /// Chunked WAV response head
    pub fn audio_wav() -> Self {
        Self {
            status: 200,
            headers: vec![
                ("content-type", "audio/wav"),
                ("cache-control", "no-cache"),
                ("connection", "keep-alive"),
            ],
        }
    }
}

/// Where relayed audio goes.
///
/// The relay calls `prepare` once, then `write_chunk` per chunk in order, then
/// either `finish` or `abort`. The sink's owner keeps the connection itself.
#[async_trait]
pub trait AudioSink: Send {
    /// Commit the response head. Called before any chunk.
    async fn prepare(&mut self, head: StreamHead) -> Result<(), RelayError>;

    /// Forward one chunk. An error means the consumer is gone.
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), RelayError>;

    /// Signal end of stream
    async fn finish(&mut self) -> Result<(), RelayError>;

    /// Terminate a committed stream after an upstream failure
    async fn abort(&mut self, _error: &RelayError) {}
}

/// Body frames consumed by the HTTP response
pub type BodyReceiver = mpsc::Receiver<Result<Bytes, std::io::Error>>;

/// Sink feeding an HTTP response body through a one-chunk channel
pub struct ChannelSink {
    head_tx: Option<oneshot::Sender<StreamHead>>,
    body_tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
}

/// Receiving half of a [`ChannelSink`], held by the HTTP handler
pub struct ChannelSinkHandle {
    pub head: oneshot::Receiver<StreamHead>,
    pub body: BodyReceiver,
}

/// Create a sink and the handle that turns it into a response
pub fn channel_sink() -> (ChannelSink, ChannelSinkHandle) {
    let (head_tx, head_rx) = oneshot::channel();
    // Zero buffer plus the single sender slot: one chunk in flight
    let (body_tx, body_rx) = mpsc::channel(0);
    (
        ChannelSink {
            head_tx: Some(head_tx),
            body_tx,
        },
        ChannelSinkHandle {
            head: head_rx,
            body: body_rx,
        },
    )
}

#[async_trait]
impl AudioSink for ChannelSink {
    async fn prepare(&mut self, head: StreamHead) -> Result<(), RelayError> {
        let tx = self
            .head_tx
            .take()
            .ok_or_else(|| RelayError::DownstreamWrite("response head already sent".to_string()))?;
        tx.send(head)
            .map_err(|_| RelayError::DownstreamWrite("client went away before response head".to_string()))
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), RelayError> {
        self.body_tx
            .send(Ok(chunk))
            .await
            .map_err(|_| RelayError::DownstreamWrite("client disconnected".to_string()))
    }

    async fn finish(&mut self) -> Result<(), RelayError> {
        self.body_tx.close_channel();
        Ok(())
    }

    async fn abort(&mut self, error: &RelayError) {
        let frame = Err(std::io::Error::other(error.to_string()));
        // The consumer may already be gone
        let _ = self.body_tx.send(frame).await;
        self.body_tx.close_channel();
    }
}

/// Sink collecting everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub head: Option<StreamHead>,
    pub chunks: Vec<Bytes>,
    pub finished: bool,
    pub aborted: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All received bytes, concatenated
    pub fn concat(&self) -> Vec<u8> {
        self.chunks.iter().flat_map(|c| c.iter().copied()).collect()
    }
}

#[async_trait]
impl AudioSink for MemorySink {
    async fn prepare(&mut self, head: StreamHead) -> Result<(), RelayError> {
        self.head = Some(head);
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), RelayError> {
        self.chunks.push(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), RelayError> {
        self.finished = true;
        Ok(())
    }

    async fn abort(&mut self, error: &RelayError) {
        self.aborted = Some(error.to_string());
    }
}
