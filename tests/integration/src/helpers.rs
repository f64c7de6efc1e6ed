//! Test helpers for integration tests
//!
//! A scripted gateway over the in-process transport: accept connections,
//! push frames, and assert on what the client sends back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use gateway_client::events::DispatchEvent;
use gateway_client::protocol::{decode, encode, GatewayMessage, IdentifyPayload, OpCode, ResumePayload};
use gateway_client::session::{Credentials, GatewaySession, SessionConfig};
use gateway_client::stream::EventStream;
use gateway_client::transport::{
    memory_transport, Connection, FrameSender, MemoryListener, MemoryPeer, MemoryTransport,
    OutboundFrame, Transport, TransportEvent, TransportResult, OUTBOUND_BUFFER_SIZE,
};
use tokio::sync::mpsc;

use crate::fixtures::{message, ready, unique_session_id, HEARTBEAT_INTERVAL_MS, TEST_TOKEN};

/// Upper bound on any single step; virtual time under `start_paused`
pub const STEP_TIMEOUT: Duration = Duration::from_secs(600);

/// Server side of the in-process transport
pub struct MockGateway {
    listener: MemoryListener,
}

impl MockGateway {
    /// Create a transport for the client and the gateway that serves it
    pub fn new() -> (MemoryTransport, Self) {
        let (transport, listener) = memory_transport();
        (transport, Self { listener })
    }

    /// Wait for the client to open a connection
    pub async fn accept(&mut self) -> Result<MockConnection> {
        let peer = tokio::time::timeout(STEP_TIMEOUT, self.listener.accept())
            .await
            .context("Timed out waiting for a connection")?
            .context("Transport dropped")?;

        Ok(MockConnection {
            peer,
            auto_ack: true,
        })
    }

    /// Take a connection the client already opened
    pub fn try_accept(&mut self) -> Option<MockConnection> {
        self.listener.try_accept().map(|peer| MockConnection {
            peer,
            auto_ack: true,
        })
    }
}

/// One accepted connection
pub struct MockConnection {
    peer: MemoryPeer,
    /// Answer client heartbeats with an ACK while skipping over them
    pub auto_ack: bool,
}

impl MockConnection {
    /// Send a gateway message to the client
    pub fn send(&self, message: &GatewayMessage) -> Result<()> {
        self.peer.send_text(encode(message))?;
        Ok(())
    }

    /// Send a raw text frame
    pub fn send_raw(&self, text: &str) -> Result<()> {
        self.peer.send_text(text)?;
        Ok(())
    }

    /// Send Hello with the default interval
    pub fn hello(&self) -> Result<()> {
        self.send(&GatewayMessage::hello(HEARTBEAT_INTERVAL_MS))
    }

    /// Next frame the client wrote, heartbeats included
    pub async fn next_frame(&mut self) -> Result<OutboundFrame> {
        tokio::time::timeout(STEP_TIMEOUT, self.peer.recv())
            .await
            .context("Timed out waiting for a frame")?
            .context("Client connection gone")
    }

    /// Next non-heartbeat message
    pub async fn next_message(&mut self) -> Result<GatewayMessage> {
        loop {
            match self.next_frame().await? {
                OutboundFrame::Text(text) => {
                    let message = decode(&text)?;
                    if message.op == OpCode::Heartbeat {
                        self.ack_if_enabled()?;
                        continue;
                    }
                    return Ok(message);
                }
                OutboundFrame::Close { code, reason } => {
                    bail!("Expected a message, client closed with {code}: {reason}")
                }
            }
        }
    }

    /// Next non-heartbeat message, which must carry `op`
    pub async fn expect_op(&mut self, op: OpCode) -> Result<GatewayMessage> {
        let message = self.next_message().await?;
        if message.op != op {
            bail!("Expected {op}, got {message}");
        }
        Ok(message)
    }

    pub async fn expect_identify(&mut self) -> Result<IdentifyPayload> {
        self.expect_op(OpCode::Identify)
            .await?
            .as_identify()
            .context("Malformed Identify")
    }

    pub async fn expect_resume(&mut self) -> Result<ResumePayload> {
        self.expect_op(OpCode::Resume)
            .await?
            .as_resume()
            .context("Malformed Resume")
    }

    /// Wait for the next heartbeat and return its sequence
    pub async fn expect_heartbeat(&mut self) -> Result<Option<u64>> {
        loop {
            match self.next_frame().await? {
                OutboundFrame::Text(text) => {
                    let message = decode(&text)?;
                    if message.op == OpCode::Heartbeat {
                        self.ack_if_enabled()?;
                        return message.as_heartbeat_seq().context("Malformed heartbeat");
                    }
                }
                OutboundFrame::Close { code, reason } => {
                    bail!("Expected a heartbeat, client closed with {code}: {reason}")
                }
            }
        }
    }

    /// Skip frames until the client closes; returns the close code and reason
    pub async fn expect_close(&mut self) -> Result<(u16, String)> {
        loop {
            match self.next_frame().await? {
                OutboundFrame::Text(text) => {
                    if decode(&text).is_ok_and(|m| m.op == OpCode::Heartbeat) {
                        self.ack_if_enabled()?;
                    }
                }
                OutboundFrame::Close { code, reason } => return Ok((code, reason)),
            }
        }
    }

    /// Take every frame already written, acking heartbeats
    pub fn drain(&mut self) -> Result<Vec<GatewayMessage>> {
        let mut messages = Vec::new();
        while let Some(frame) = self.peer.try_recv() {
            if let OutboundFrame::Text(text) = frame {
                let message = decode(&text)?;
                if message.op == OpCode::Heartbeat {
                    self.ack_if_enabled()?;
                }
                messages.push(message);
            }
        }
        Ok(messages)
    }

    /// Hello, Identify, then READY at sequence 1
    pub async fn handshake(&mut self, session_id: &str) -> Result<IdentifyPayload> {
        self.hello()?;
        let identify = self.expect_identify().await?;
        self.send(&ready(session_id, 1))?;
        Ok(identify)
    }

    /// Close with a close code
    pub fn close(self, code: u16, reason: &str) {
        self.peer.close(code, reason);
    }

    pub fn is_client_gone(&self) -> bool {
        self.peer.is_client_gone()
    }

    fn ack_if_enabled(&self) -> Result<()> {
        if self.auto_ack {
            self.send(&GatewayMessage::heartbeat_ack())?;
        }
        Ok(())
    }
}

/// Transport whose gateway writes as fast as the client reads
///
/// Each connection yields Hello, READY at sequence 1, then MESSAGE_CREATE
/// dispatches up to `last_sequence`, then goes quiet. `reads` counts every
/// frame the client pulled off the wire.
#[derive(Debug, Clone)]
pub struct FloodTransport {
    last_sequence: u64,
    reads: Arc<AtomicUsize>,
}

impl FloodTransport {
    pub fn new(last_sequence: u64) -> Self {
        Self {
            last_sequence,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Frames read so far across all connections
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FloodTransport {
    async fn open(&self, _url: &str) -> TransportResult<Box<dyn Connection>> {
        let (tx, written) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        Ok(Box::new(FloodConnection {
            sender: FrameSender::new(tx),
            _written: written,
            session_id: unique_session_id(),
            next: 0,
            last_sequence: self.last_sequence,
            reads: Arc::clone(&self.reads),
        }))
    }
}

struct FloodConnection {
    sender: FrameSender,
    // held so client writes succeed
    _written: mpsc::Receiver<OutboundFrame>,
    session_id: String,
    next: u64,
    last_sequence: u64,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for FloodConnection {
    fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    async fn recv(&mut self) -> TransportEvent {
        if self.next > self.last_sequence {
            return std::future::pending().await;
        }
        tokio::task::yield_now().await;

        let frame = match self.next {
            0 => GatewayMessage::hello(HEARTBEAT_INTERVAL_MS),
            1 => ready(&self.session_id, 1),
            seq => message(&format!("message {seq}"), seq),
        };
        self.next += 1;
        self.reads.fetch_add(1, Ordering::SeqCst);
        TransportEvent::Frame(encode(&frame))
    }

    async fn close(&mut self, _code: u16, _reason: &str) {}
}

/// Session configuration with short reidentify delays
pub fn test_config() -> SessionConfig {
    SessionConfig::default()
        .with_reidentify_delay(Duration::from_millis(100), Duration::from_millis(500))
}

/// Start a session on `transport` and take its event stream
pub async fn start_session(
    transport: MemoryTransport,
    config: SessionConfig,
) -> Result<(GatewaySession, EventStream)> {
    let mut session = GatewaySession::builder()
        .transport(transport)
        .config(config)
        .connect("memory://gateway", Credentials::new(TEST_TOKEN))
        .await?;
    let events = session.events().context("Event stream already taken")?;
    Ok((session, events))
}

/// Next event from the stream
pub async fn next_event(events: &mut EventStream) -> Result<DispatchEvent> {
    tokio::time::timeout(STEP_TIMEOUT, events.recv())
        .await
        .context("Timed out waiting for an event")?
        .context("Event stream ended")
}

/// Wait for the stream to end
pub async fn expect_stream_end(events: &mut EventStream) -> Result<()> {
    match tokio::time::timeout(STEP_TIMEOUT, events.recv())
        .await
        .context("Timed out waiting for the stream to end")?
    {
        None => Ok(()),
        Some(event) => bail!("Expected end of stream, got {} (seq {})", event.name(), event.sequence),
    }
}
