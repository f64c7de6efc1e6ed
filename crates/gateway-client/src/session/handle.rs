//! Session handle
//!
//! The caller's side of a running session: commands go in through a channel,
//! state and identity are read through shared views, events come out of the
//! [`EventStream`].

use super::config::{Credentials, SessionConfig};
use super::driver::{open_connection, DriverParts, SessionCommand, SessionDriver, ShutdownSignal};
use super::error::{SessionError, SessionResult};
use super::state::{SessionIdentity, SessionState, SessionTracker, SharedTracker};
use crate::protocol::Presence;
use crate::stream::{event_channel, EventStream};
use crate::transport::{Transport, WsTransport};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// A running gateway session
///
/// Dropping the handle asks the session to stop.
pub struct GatewaySession {
    commands: mpsc::Sender<SessionCommand>,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<SessionState>,
    tracker: SharedTracker,
    events: Option<EventStream>,
    task: Option<JoinHandle<()>>,
}

impl GatewaySession {
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Connect over WebSocket with the default configuration
    ///
    /// Returns once the transport is open; the handshake continues in the background.
    pub async fn connect(
        endpoint: &str,
        credentials: Credentials,
        presence: Option<Presence>,
    ) -> SessionResult<Self> {
        let mut builder = Self::builder();
        if let Some(presence) = presence {
            builder = builder.presence(presence);
        }
        builder.connect(endpoint, credentials).await
    }

    /// Take the event stream; only the first call returns it
    pub fn events(&mut self) -> Option<EventStream> {
        self.events.take()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state changes
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the session reaches `target`
    ///
    /// # Errors
    /// Returns [`SessionError::NotRunning`] if the session ends first.
    pub async fn wait_for_state(&self, target: SessionState) -> SessionResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| SessionError::NotRunning)
    }

    /// Current resumable identity
    #[must_use]
    pub fn identity(&self) -> Option<SessionIdentity> {
        self.tracker.lock().identity()
    }

    /// Check if the session task is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Change presence
    ///
    /// Sent right away when connected, otherwise once the session is connected again.
    /// The gateway does not acknowledge presence updates.
    pub async fn update_presence(&self, presence: Presence) -> SessionResult<()> {
        self.command(SessionCommand::UpdatePresence(presence)).await
    }

    /// Drop the current connection and resume on a new one
    pub async fn reconnect(&self) -> SessionResult<()> {
        self.command(SessionCommand::Reconnect).await
    }

    /// Stop the session and wait for it to finish
    ///
    /// Cancels any pending backoff or connection attempt. The heartbeat is
    /// stopped before this returns. Returns the identity for a later
    /// [`SessionBuilder::resume_from`], if the session still had one.
    pub async fn close(&mut self) -> Option<SessionIdentity> {
        self.shutdown.send_replace(true);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session task ended abnormally");
            }
        }

        self.identity()
    }

    async fn command(&self, command: SessionCommand) -> SessionResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::NotRunning)
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("state", &self.state())
            .field("identity", &self.identity())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Builder for [`GatewaySession`]
pub struct SessionBuilder {
    transport: Option<Arc<dyn Transport>>,
    config: SessionConfig,
    presence: Option<Presence>,
    identity: Option<SessionIdentity>,
}

impl SessionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: None,
            config: SessionConfig::default(),
            presence: None,
            identity: None,
        }
    }

    /// Use a transport other than WebSocket
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Presence sent with Identify
    #[must_use]
    pub fn presence(mut self, presence: Presence) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Resume a previous session instead of identifying
    #[must_use]
    pub fn resume_from(mut self, identity: SessionIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Open the first connection and start the session
    ///
    /// # Errors
    /// Returns an error if the first connection cannot be opened within the connect timeout.
    pub async fn connect(
        self,
        endpoint: &str,
        credentials: Credentials,
    ) -> SessionResult<GatewaySession> {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransport::new()));
        let tracker = match self.identity {
            Some(identity) => SessionTracker::from_identity(identity),
            None => SessionTracker::new(),
        }
        .shared();

        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        tracing::info!(endpoint = %endpoint, resuming = tracker.lock().identity().is_some(), "Connecting to gateway");

        let conn = open_connection(&*transport, endpoint, self.config.connect_timeout)
            .await
            .map_err(|e| {
                tracing::error!(endpoint = %endpoint, error = %e, "Failed to open gateway connection");
                SessionError::from(e)
            })?;

        let (sink, events) = event_channel(self.config.event_buffer);
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let driver = SessionDriver::new(DriverParts {
            transport,
            endpoint: endpoint.to_string(),
            credentials,
            presence: self.presence,
            config: self.config,
            tracker: Arc::clone(&tracker),
            state: state_tx,
            commands: command_rx,
            shutdown: ShutdownSignal::new(shutdown_rx),
            sink,
        });

        let span = tracing::info_span!("gateway_session", endpoint = %endpoint);
        let task = tokio::spawn(driver.run(conn).instrument(span));

        Ok(GatewaySession {
            commands: command_tx,
            shutdown: shutdown_tx,
            state: state_rx,
            tracker,
            events: Some(events),
            task: Some(task),
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
