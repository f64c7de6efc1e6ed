//! Session driver
//!
//! One spawned task per session. It owns the live connection, the heartbeat
//! controller and the event sink, and is the only writer of the session
//! tracker. Every input (shutdown, heartbeat signal, consumer command,
//! transport event) becomes a [`DriverInput`] handled by one `match`.

use super::backoff::Backoff;
use super::config::{Credentials, SessionConfig};
use super::error::SessionError;
use super::state::{SequenceCheck, SessionState, SharedTracker};
use crate::events::{DispatchEvent, GatewayEvent, GatewayEventType};
use crate::heartbeat::{HeartbeatController, HeartbeatSignal};
use crate::protocol::{
    decode, encode, CloseAction, GatewayMessage, IdentifyPayload, OpCode, Presence, ResumePayload,
};
use crate::stream::{CloseReason, EventSink};
use crate::transport::{
    CloseInfo, Connection, FrameSender, Transport, TransportError, TransportEvent, TransportResult,
};
use rand::Rng;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Close code used when dropping a connection we intend to resume
const RECONNECT_CLOSE_CODE: u16 = 4000;

/// Close code used when the session ends
const NORMAL_CLOSE_CODE: u16 = 1000;

/// Heartbeat signals buffered between the timer and the driver
const SIGNAL_BUFFER_SIZE: usize = 4;

/// Commands from the session handle
#[derive(Debug)]
pub(crate) enum SessionCommand {
    UpdatePresence(Presence),
    Reconnect,
}

/// Everything the driver reacts to while a connection is live
#[derive(Debug)]
enum DriverInput {
    Shutdown,
    Heartbeat(HeartbeatSignal),
    Command(SessionCommand),
    Transport(TransportEvent),
    HelloTimeout,
    /// Delay after a rejected resume has elapsed
    Reidentify,
}

/// How a connection ended
#[derive(Debug)]
enum ConnectionExit {
    /// Owner asked the session to stop
    Shutdown,
    /// Consumer dropped the event stream
    ConsumerGone,
    /// Open a new connection; `resume` keeps the session identity
    Reconnect { resume: bool },
    Fatal(SessionError),
}

/// Shutdown flag set by the session handle
#[derive(Debug, Clone)]
pub(crate) struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self(rx)
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown is requested or the handle is gone
    pub(crate) async fn wait(&mut self) {
        if self.is_set() {
            return;
        }
        while self.0.changed().await.is_ok() {
            if *self.0.borrow_and_update() {
                return;
            }
        }
    }
}

/// Per-connection state
struct ConnectionContext {
    conn: Box<dyn Connection>,
    sender: FrameSender,
    heartbeat: Option<HeartbeatController>,
    /// Frames read while a delivery was waiting on the consumer
    backlog: VecDeque<TransportEvent>,
    /// The transport reported its close; don't read from it again
    closed: bool,
    /// When to identify again after a rejected resume
    reidentify_at: Option<Instant>,
}

impl ConnectionContext {
    fn new(conn: Box<dyn Connection>) -> Self {
        Self {
            sender: conn.sender(),
            conn,
            heartbeat: None,
            backlog: VecDeque::new(),
            closed: false,
            reidentify_at: None,
        }
    }

    async fn send(&self, message: &GatewayMessage) -> Result<(), TransportError> {
        debug_assert!(message.op.is_client_op(), "{} is not a client op", message.op);
        tracing::trace!(op = %message.op, "Sending frame");
        self.sender.send_text(encode(message)).await
    }

    async fn beat_now(&self) {
        let result = match &self.heartbeat {
            Some(heartbeat) => heartbeat.beat_now().await,
            None => self.send(&GatewayMessage::heartbeat(None)).await,
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "Failed to send requested heartbeat");
        }
    }

    fn on_ack(&self) {
        match &self.heartbeat {
            Some(heartbeat) => {
                heartbeat.on_ack();
                let latency_ms = heartbeat.latency().map(|l| l.as_millis() as u64);
                tracing::trace!(latency_ms = ?latency_ms, "Heartbeat acknowledged");
            }
            None => tracing::debug!("Heartbeat ACK before Hello ignored"),
        }
    }

    /// Tear down the heartbeat and close the transport
    async fn finish(mut self, code: u16, reason: &str) {
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.shutdown().await;
        }
        self.conn.close(code, reason).await;
    }
}

/// Open a connection, bounded by `timeout`
pub(crate) async fn open_connection(
    transport: &dyn Transport,
    url: &str,
    timeout: Duration,
) -> TransportResult<Box<dyn Connection>> {
    tokio::time::timeout(timeout, transport.open(url))
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
}

pub(crate) struct SessionDriver {
    transport: Arc<dyn Transport>,
    endpoint: String,
    credentials: Credentials,
    presence: Option<Presence>,
    /// Presence changed while not connected; send it once dispatches flow
    presence_pending: bool,
    config: SessionConfig,
    tracker: SharedTracker,
    state: watch::Sender<SessionState>,
    commands: mpsc::Receiver<SessionCommand>,
    shutdown: ShutdownSignal,
    sink: EventSink,
    signal_tx: mpsc::Sender<HeartbeatSignal>,
    signal_rx: mpsc::Receiver<HeartbeatSignal>,
    backoff: Backoff,
}

/// Everything the driver needs besides its first connection
pub(crate) struct DriverParts {
    pub transport: Arc<dyn Transport>,
    pub endpoint: String,
    pub credentials: Credentials,
    pub presence: Option<Presence>,
    pub config: SessionConfig,
    pub tracker: SharedTracker,
    pub state: watch::Sender<SessionState>,
    pub commands: mpsc::Receiver<SessionCommand>,
    pub shutdown: ShutdownSignal,
    pub sink: EventSink,
}

impl SessionDriver {
    pub(crate) fn new(parts: DriverParts) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER_SIZE);
        let backoff = Backoff::new(parts.config.backoff);

        Self {
            transport: parts.transport,
            endpoint: parts.endpoint,
            credentials: parts.credentials,
            presence: parts.presence,
            presence_pending: false,
            config: parts.config,
            tracker: parts.tracker,
            state: parts.state,
            commands: parts.commands,
            shutdown: parts.shutdown,
            sink: parts.sink,
            signal_tx,
            signal_rx,
            backoff,
        }
    }

    /// Drive the session until it is closed or fails
    pub(crate) async fn run(mut self, conn: Box<dyn Connection>) {
        let reason = self.run_connections(conn).await;

        match &reason {
            CloseReason::Closed => tracing::info!("Gateway session closed"),
            CloseReason::Fatal(err) => {
                self.tracker.lock().clear();
                tracing::error!(error = %err, code = err.error_code(), "Gateway session failed");
            }
        }

        self.set_state(SessionState::Disconnected);
        self.sink.close(reason);
    }

    async fn run_connections(&mut self, conn: Box<dyn Connection>) -> CloseReason {
        let mut ctx = ConnectionContext::new(conn);

        loop {
            match self.drive(&mut ctx).await {
                ConnectionExit::Shutdown => {
                    ctx.finish(NORMAL_CLOSE_CODE, "session closed").await;
                    return CloseReason::Closed;
                }
                ConnectionExit::ConsumerGone => {
                    tracing::info!("Event stream dropped by consumer, ending session");
                    ctx.finish(NORMAL_CLOSE_CODE, "session closed").await;
                    return CloseReason::Closed;
                }
                ConnectionExit::Fatal(err) => {
                    ctx.finish(NORMAL_CLOSE_CODE, "session failed").await;
                    return CloseReason::Fatal(err);
                }
                ConnectionExit::Reconnect { resume } => {
                    if !resume {
                        self.tracker.lock().clear();
                    }
                    ctx.finish(RECONNECT_CLOSE_CODE, "reconnecting").await;

                    match self.reconnect().await {
                        Ok(conn) => ctx = ConnectionContext::new(conn),
                        Err(reason) => return reason,
                    }
                }
            }
        }
    }

    /// Open a new connection with backoff
    async fn reconnect(&mut self) -> Result<Box<dyn Connection>, CloseReason> {
        loop {
            let attempts = self.backoff.attempt();
            if attempts >= self.config.max_reconnect_attempts {
                return Err(CloseReason::Fatal(SessionError::ReconnectExhausted { attempts }));
            }

            self.set_state(SessionState::Reconnecting);
            let delay = self.backoff.next_delay();
            tracing::info!(
                attempt = self.backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to gateway"
            );

            tokio::select! {
                biased;
                () = self.shutdown.wait() => return Err(CloseReason::Closed),
                () = tokio::time::sleep(delay) => {}
            }

            self.set_state(SessionState::Connecting);
            let result = tokio::select! {
                biased;
                () = self.shutdown.wait() => return Err(CloseReason::Closed),
                result = open_connection(&*self.transport, &self.endpoint, self.config.connect_timeout) => result,
            };

            match result {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    tracing::warn!(attempt = self.backoff.attempt(), error = %e, "Reconnect attempt failed");
                }
            }
        }
    }

    /// Run one connection until it ends
    async fn drive(&mut self, ctx: &mut ConnectionContext) -> ConnectionExit {
        // signals from the previous connection's heartbeat are stale
        while self.signal_rx.try_recv().is_ok() {}

        self.set_state(SessionState::AwaitingHello);
        let hello_deadline = Instant::now() + self.config.connect_timeout;

        loop {
            let input = if let Some(event) = ctx.backlog.pop_front() {
                DriverInput::Transport(event)
            } else {
                let awaiting_hello = ctx.heartbeat.is_none();
                let reidentify_at = ctx.reidentify_at;
                tokio::select! {
                    biased;
                    () = self.shutdown.wait() => DriverInput::Shutdown,
                    Some(signal) = self.signal_rx.recv() => DriverInput::Heartbeat(signal),
                    command = self.commands.recv() => match command {
                        Some(command) => DriverInput::Command(command),
                        None => DriverInput::Shutdown,
                    },
                    event = ctx.conn.recv(), if !ctx.closed => DriverInput::Transport(event),
                    () = tokio::time::sleep_until(hello_deadline), if awaiting_hello => DriverInput::HelloTimeout,
                    () = tokio::time::sleep_until(reidentify_at.unwrap_or(hello_deadline)), if reidentify_at.is_some() => {
                        DriverInput::Reidentify
                    }
                }
            };

            if let Some(exit) = self.handle_input(ctx, input).await {
                return exit;
            }
        }
    }

    async fn handle_input(
        &mut self,
        ctx: &mut ConnectionContext,
        input: DriverInput,
    ) -> Option<ConnectionExit> {
        match input {
            DriverInput::Shutdown => Some(ConnectionExit::Shutdown),
            DriverInput::Heartbeat(HeartbeatSignal::Zombied) => {
                tracing::warn!(state = %self.current_state(), "Connection zombied, reconnecting");
                Some(ConnectionExit::Reconnect { resume: true })
            }
            DriverInput::Command(SessionCommand::UpdatePresence(presence)) => {
                self.update_presence(ctx, presence).await
            }
            DriverInput::Command(SessionCommand::Reconnect) => {
                tracing::info!("Reconnect requested");
                Some(ConnectionExit::Reconnect { resume: true })
            }
            DriverInput::Transport(TransportEvent::Frame(text)) => self.on_frame(ctx, &text).await,
            DriverInput::Transport(TransportEvent::Closed(info)) => {
                ctx.closed = true;
                Some(self.on_close(&info))
            }
            DriverInput::HelloTimeout => {
                tracing::warn!(
                    timeout_ms = self.config.connect_timeout.as_millis() as u64,
                    "No Hello received, reconnecting"
                );
                Some(ConnectionExit::Reconnect { resume: true })
            }
            DriverInput::Reidentify => {
                ctx.reidentify_at = None;
                self.identify(ctx).await
            }
        }
    }

    async fn on_frame(&mut self, ctx: &mut ConnectionContext, text: &str) -> Option<ConnectionExit> {
        let message = match decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed frame");
                return None;
            }
        };

        tracing::trace!(op = %message.op, seq = ?message.s, "Frame received");

        if !message.op.is_server_op() {
            tracing::warn!(op = %message.op, "Ignoring client op code sent by gateway");
            return None;
        }

        match message.op {
            OpCode::Hello => self.on_hello(ctx, &message).await,
            OpCode::HeartbeatAck => {
                ctx.on_ack();
                None
            }
            OpCode::Heartbeat => {
                ctx.beat_now().await;
                None
            }
            OpCode::Reconnect => {
                tracing::info!("Gateway requested reconnect");
                Some(ConnectionExit::Reconnect { resume: true })
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                self.on_invalid_session(ctx, resumable).await
            }
            OpCode::Dispatch => self.on_dispatch(ctx, message).await,
            // filtered above
            OpCode::Identify | OpCode::StatusUpdate | OpCode::Resume => None,
        }
    }

    async fn on_hello(
        &mut self,
        ctx: &mut ConnectionContext,
        message: &GatewayMessage,
    ) -> Option<ConnectionExit> {
        if ctx.heartbeat.is_some() {
            tracing::debug!("Duplicate Hello ignored");
            return None;
        }

        let interval = match message.as_hello() {
            Some(hello) if hello.heartbeat_interval > 0 => {
                Duration::from_millis(hello.heartbeat_interval)
            }
            _ => {
                tracing::warn!("Hello without a usable heartbeat interval, skipping");
                return None;
            }
        };

        tracing::debug!(heartbeat_interval_ms = interval.as_millis() as u64, "Hello received");
        ctx.heartbeat = Some(HeartbeatController::start(
            interval,
            ctx.sender.clone(),
            Arc::clone(&self.tracker),
            self.signal_tx.clone(),
        ));

        self.handshake(ctx).await
    }

    /// Send Resume when an identity is held, Identify otherwise
    async fn handshake(&mut self, ctx: &ConnectionContext) -> Option<ConnectionExit> {
        let identity = self.tracker.lock().identity();

        let message = match identity {
            Some(identity) => {
                tracing::info!(
                    session_id = %identity.session_id,
                    seq = identity.last_sequence,
                    "Resuming session"
                );
                self.set_state(SessionState::Resuming);
                GatewayMessage::resume(&ResumePayload {
                    token: self.credentials.token.clone(),
                    session_id: identity.session_id,
                    seq: identity.last_sequence,
                })
            }
            None => return self.identify(ctx).await,
        };

        self.send(ctx, &message).await
    }

    async fn identify(&mut self, ctx: &ConnectionContext) -> Option<ConnectionExit> {
        tracing::info!("Identifying");
        self.set_state(SessionState::Identifying);
        // presence rides along with Identify
        self.presence_pending = false;

        let payload = IdentifyPayload {
            token: self.credentials.token.clone(),
            properties: self.config.properties.clone(),
            presence: self.presence.clone(),
            intents: self.config.intents,
            large_threshold: self.config.large_threshold,
        };
        self.send(ctx, &GatewayMessage::identify(&payload)).await
    }

    async fn on_invalid_session(
        &mut self,
        ctx: &mut ConnectionContext,
        resumable: bool,
    ) -> Option<ConnectionExit> {
        if resumable {
            tracing::info!("Session invalidated but resumable, reconnecting");
            return Some(ConnectionExit::Reconnect { resume: true });
        }

        self.tracker.lock().clear();

        if self.current_state() != SessionState::Resuming {
            return Some(ConnectionExit::Fatal(SessionError::InvalidSession));
        }

        let (min, max) = self.config.reidentify_delay;
        let delay = rand::thread_rng().gen_range(min..=max);
        tracing::info!(delay_ms = delay.as_millis() as u64, "Resume rejected, identifying again");

        // the driver loop keeps serving heartbeats until the deadline
        ctx.reidentify_at = Some(Instant::now() + delay);
        None
    }

    async fn on_dispatch(
        &mut self,
        ctx: &mut ConnectionContext,
        message: GatewayMessage,
    ) -> Option<ConnectionExit> {
        let (Some(sequence), Some(name)) = (message.s, message.t) else {
            return None;
        };
        let state = self.current_state();

        let check = self.tracker.lock().check(sequence);
        match check {
            SequenceCheck::Next => {}
            SequenceCheck::Duplicate => {
                tracing::debug!(seq = sequence, event = %name, "Skipping duplicate dispatch");
                if state == SessionState::Resuming && name == GatewayEventType::Resumed.as_str() {
                    self.set_state(SessionState::Connected);
                    self.backoff.reset();
                    return self.flush_presence(ctx).await;
                }
                return None;
            }
            SequenceCheck::Gap { expected, got } => {
                tracing::warn!(expected, got, state = %state, "Sequence gap detected");
                // a gap in a replay means the resume cannot be trusted
                let resume = state != SessionState::Resuming;
                return Some(ConnectionExit::Reconnect { resume });
            }
        }

        let event = GatewayEvent::decode(&name, message.d.unwrap_or(Value::Null));
        match &event {
            GatewayEvent::Ready(ready) => {
                self.tracker.lock().establish(ready.session_id.clone());
                tracing::info!(
                    session_id = %ready.session_id,
                    user = %ready.user.display_name(),
                    guilds = ready.guilds.len(),
                    "Session ready"
                );
            }
            GatewayEvent::Resumed => tracing::info!(seq = sequence, "Session resumed"),
            _ => {}
        }

        let previous = self.tracker.lock().record(sequence);

        if state.is_handshaking() {
            self.set_state(SessionState::Connected);
            self.backoff.reset();
            if let Some(exit) = self.flush_presence(ctx).await {
                return Some(exit);
            }
        }

        tracing::trace!(seq = sequence, event = %name, "Delivering event");
        self.deliver(ctx, DispatchEvent::new(sequence, event), previous)
            .await
    }

    /// Push onto the event stream
    ///
    /// While the consumer is slow, acks and heartbeat requests are still
    /// handled; other frames wait in the backlog so ordering holds. Reading
    /// stops once the backlog reaches `frame_backlog`. A zombied heartbeat
    /// abandons the event and reconnects to have it replayed.
    async fn deliver(
        &mut self,
        ctx: &mut ConnectionContext,
        event: DispatchEvent,
        previous: Option<u64>,
    ) -> Option<ConnectionExit> {
        let push = self.sink.push(event);
        tokio::pin!(push);

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.wait() => {
                    self.tracker.lock().rollback(previous);
                    return Some(ConnectionExit::Shutdown);
                }
                result = &mut push => {
                    return match result {
                        Ok(()) => None,
                        Err(_) => Some(ConnectionExit::ConsumerGone),
                    };
                }
                Some(HeartbeatSignal::Zombied) = self.signal_rx.recv() => {
                    self.tracker.lock().rollback(previous);
                    tracing::warn!(
                        backlog = ctx.backlog.len(),
                        "Connection zombied while delivering, reconnecting"
                    );
                    return Some(ConnectionExit::Reconnect { resume: true });
                }
                event = ctx.conn.recv(), if !ctx.closed && ctx.backlog.len() < self.config.frame_backlog => {
                    let op = match &event {
                        TransportEvent::Frame(text) => decode(text).ok().map(|m| m.op),
                        TransportEvent::Closed(_) => {
                            ctx.closed = true;
                            None
                        }
                    };
                    match op {
                        Some(OpCode::HeartbeatAck) => ctx.on_ack(),
                        Some(OpCode::Heartbeat) => ctx.beat_now().await,
                        _ => ctx.backlog.push_back(event),
                    }
                }
            }
        }
    }

    async fn update_presence(
        &mut self,
        ctx: &ConnectionContext,
        presence: Presence,
    ) -> Option<ConnectionExit> {
        let message = GatewayMessage::status_update(&presence);
        self.presence = Some(presence);

        if self.current_state() == SessionState::Connected {
            tracing::debug!("Sending presence update");
            self.send(ctx, &message).await
        } else {
            tracing::debug!(state = %self.current_state(), "Presence update held until connected");
            self.presence_pending = true;
            None
        }
    }

    async fn flush_presence(&mut self, ctx: &ConnectionContext) -> Option<ConnectionExit> {
        if !self.presence_pending {
            return None;
        }
        self.presence_pending = false;

        let message = self.presence.as_ref().map(GatewayMessage::status_update)?;
        self.send(ctx, &message).await
    }

    fn on_close(&self, info: &CloseInfo) -> ConnectionExit {
        let action = self.config.close_codes.classify(info.code);
        tracing::info!(code = ?info.code, reason = %info.reason, action = ?action, "Gateway connection closed");

        match action {
            CloseAction::Resume => ConnectionExit::Reconnect { resume: true },
            CloseAction::Reidentify => ConnectionExit::Reconnect { resume: false },
            CloseAction::Fatal => ConnectionExit::Fatal(match info.code {
                Some(4004) => SessionError::AuthenticationFailed(info.reason.clone()),
                Some(code) => SessionError::Closed {
                    code,
                    reason: info.reason.clone(),
                },
                None => SessionError::Transport(info.reason.clone()),
            }),
        }
    }

    async fn send(&self, ctx: &ConnectionContext, message: &GatewayMessage) -> Option<ConnectionExit> {
        match ctx.send(message).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(op = %message.op, error = %e, "Failed to send frame, reconnecting");
                Some(ConnectionExit::Reconnect { resume: true })
            }
        }
    }

    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Session state changed");
        }
    }
}
