//! In-process transport
//!
//! Connections opened on a [`MemoryTransport`] surface as [`MemoryPeer`]s on
//! the paired [`MemoryListener`], which plays the server side.

use super::{
    CloseInfo, Connection, FrameSender, OutboundFrame, Transport, TransportError, TransportEvent,
    TransportResult, OUTBOUND_BUFFER_SIZE,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Create a connected transport/listener pair
#[must_use]
pub fn memory_transport() -> (MemoryTransport, MemoryListener) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MemoryTransport { accept_tx: tx }, MemoryListener { accept_rx: rx })
}

/// Client side of the in-process transport
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &str) -> TransportResult<Box<dyn Connection>> {
        let (client_tx, client_rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            url: url.to_string(),
            inbound: client_rx,
            outbound: server_tx,
        };
        self.accept_tx
            .send(peer)
            .map_err(|_| TransportError::Connect(format!("no listener for {url}")))?;

        Ok(Box::new(MemoryConnection {
            sender: FrameSender::new(client_tx),
            inbound: server_rx,
        }))
    }
}

/// Server side of the in-process transport; yields one peer per opened connection
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Wait for the next connection; `None` once every transport handle is dropped
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Take an already opened connection without waiting
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.try_recv().ok()
    }
}

/// Server end of one in-process connection
///
/// Dropping the peer drops the connection without a close frame.
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    inbound: mpsc::Receiver<OutboundFrame>,
    outbound: mpsc::UnboundedSender<TransportEvent>,
}

impl MemoryPeer {
    /// URL the client opened
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a text frame to the client
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] if the client connection is gone.
    pub fn send_text(&self, text: impl Into<String>) -> TransportResult<()> {
        self.outbound
            .send(TransportEvent::Frame(text.into()))
            .map_err(|_| TransportError::Closed)
    }

    /// Next frame written by the client; `None` once the client connection is gone
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.inbound.recv().await
    }

    /// Take a frame already written by the client without waiting
    pub fn try_recv(&mut self) -> Option<OutboundFrame> {
        self.inbound.try_recv().ok()
    }

    /// Close the connection with a close code
    pub fn close(self, code: u16, reason: &str) {
        let _ = self
            .outbound
            .send(TransportEvent::Closed(CloseInfo::new(code, reason)));
    }

    /// Check if the client side has dropped the connection
    #[must_use]
    pub fn is_client_gone(&self) -> bool {
        self.outbound.is_closed()
    }
}

struct MemoryConnection {
    sender: FrameSender,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    async fn recv(&mut self) -> TransportEvent {
        self.inbound
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::Closed(CloseInfo::abnormal("peer dropped")))
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let _ = self.sender.send_close(code, reason);
        self.inbound.close();
    }
}
