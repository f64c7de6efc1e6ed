//! WebSocket transport
//!
//! tokio-tungstenite client. The socket is split: the connection owns the
//! reading half, a spawned writer task drains the outbound channel.

use super::{
    CloseInfo, Connection, FrameSender, OutboundFrame, Transport, TransportEvent, TransportResult,
    OUTBOUND_BUFFER_SIZE,
};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `close` waits for the writer to flush the close frame
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket transport over tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WsTransport {
    outbound_buffer: usize,
}

impl WsTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            outbound_buffer: OUTBOUND_BUFFER_SIZE,
        }
    }

    /// Set the outbound frame buffer size
    #[must_use]
    pub fn with_outbound_buffer(mut self, size: usize) -> Self {
        self.outbound_buffer = size.max(1);
        self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> TransportResult<Box<dyn Connection>> {
        let (stream, response) = connect_async(url).await?;
        tracing::debug!(url = %url, status = %response.status(), "WebSocket connected");

        let (sink, reader) = stream.split();
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let writer = tokio::spawn(write_loop(sink, rx));

        Ok(Box::new(WsConnection {
            sender: FrameSender::new(tx),
            reader,
            writer,
        }))
    }
}

struct WsConnection {
    sender: FrameSender,
    reader: SplitStream<WsStream>,
    writer: JoinHandle<()>,
}

#[async_trait]
impl Connection for WsConnection {
    fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    async fn recv(&mut self) -> TransportEvent {
        while let Some(msg) = self.reader.next().await {
            match msg {
                Ok(Message::Text(text)) => return TransportEvent::Frame(text),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return TransportEvent::Frame(text),
                    Err(_) => tracing::warn!("Dropping binary frame that is not UTF-8"),
                },
                Ok(Message::Close(frame)) => {
                    let info = match frame {
                        Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason),
                        None => CloseInfo::abnormal("close frame without status"),
                    };
                    return TransportEvent::Closed(info);
                }
                Ok(_) => {
                    // Ping/Pong; tungstenite answers pings itself
                    tracing::trace!("Control frame received");
                }
                Err(e) => return TransportEvent::Closed(CloseInfo::abnormal(e.to_string())),
            }
        }

        TransportEvent::Closed(CloseInfo::abnormal("stream ended"))
    }

    async fn close(&mut self, code: u16, reason: &str) {
        if self.sender.send_close(code, reason).is_err() {
            self.writer.abort();
            return;
        }

        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut self.writer)
            .await
            .is_err()
        {
            tracing::debug!(code, "Writer did not finish closing in time");
            self.writer.abort();
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

async fn write_loop(mut sink: SplitSink<WsStream, Message>, mut rx: mpsc::Receiver<OutboundFrame>) {
    while let Some(frame) = rx.recv().await {
        let (message, closing) = match frame {
            OutboundFrame::Text(text) => (Message::Text(text), false),
            OutboundFrame::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code: WsCloseCode::from(code),
                    reason: reason.into(),
                })),
                true,
            ),
        };

        if let Err(e) = sink.send(message).await {
            tracing::warn!(error = %e, "Failed to send frame to WebSocket");
            return;
        }
        if closing {
            break;
        }
    }

    // Close the WebSocket when channel is closed
    let _ = sink.close().await;
}
