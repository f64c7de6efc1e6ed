//! Transport adapters
//!
//! A transport opens message-framed duplex connections. It knows nothing
//! about the gateway protocol: it moves text frames and reports closes.

mod memory;
mod ws;

pub use memory::{memory_transport, MemoryListener, MemoryPeer, MemoryTransport};
pub use ws::WsTransport;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Channel buffer size for outgoing frames
pub const OUTBOUND_BUFFER_SIZE: usize = 64;

/// Opens connections to a gateway endpoint
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to `url`
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    async fn open(&self, url: &str) -> TransportResult<Box<dyn Connection>>;
}

/// A single live connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Handle for queueing outbound frames; cheap to clone
    fn sender(&self) -> FrameSender;

    /// Wait for the next inbound frame or the close of the connection
    ///
    /// Once `Closed` has been returned the connection is finished.
    async fn recv(&mut self) -> TransportEvent;

    /// Close the connection with a close code
    async fn close(&mut self, code: u16, reason: &str);
}

/// Frame queued for the writing half of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Cloneable writer handle for a connection
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<OutboundFrame>,
}

impl FrameSender {
    #[must_use]
    pub fn new(tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self { tx }
    }

    /// Queue a text frame
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] if the writing half is gone.
    pub async fn send_text(&self, text: String) -> TransportResult<()> {
        self.tx
            .send(OutboundFrame::Text(text))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Queue a close frame without waiting for buffer space
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] if the writing half is gone or full.
    pub fn send_close(&self, code: u16, reason: &str) -> TransportResult<()> {
        self.tx
            .try_send(OutboundFrame::Close {
                code,
                reason: reason.to_string(),
            })
            .map_err(|_| TransportError::Closed)
    }

    /// Check if the writing half has gone away
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Something that happened on the reading half of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived
    Frame(String),
    /// The connection closed
    Closed(CloseInfo),
}

/// How a connection closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code from the close frame; `None` when the connection dropped without one
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Connection dropped without a close frame
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "closed with code {code}: {}", self.reason),
            None => write!(f, "dropped: {}", self.reason),
        }
    }
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection closed")]
    Closed,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
