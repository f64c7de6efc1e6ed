//! Session state and identity tracking

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No connection; terminal once the driver has stopped
    #[default]
    Disconnected,
    /// Opening the transport
    Connecting,
    /// Transport open, waiting for Hello
    AwaitingHello,
    /// Identify sent, waiting for the first dispatch
    Identifying,
    /// Resume sent, waiting for the replay
    Resuming,
    /// Dispatches flowing
    Connected,
    /// Connection lost, waiting out the backoff before the next attempt
    Reconnecting,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Check if a handshake (Identify or Resume) is in flight
    #[must_use]
    pub const fn is_handshaking(self) -> bool {
        matches!(self, Self::Identifying | Self::Resuming)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity needed to resume a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub session_id: String,
    pub last_sequence: u64,
}

/// Result of checking an incoming sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Next expected sequence (or the first one seen)
    Next,
    /// Already seen
    Duplicate,
    /// Sequence numbers were skipped
    Gap { expected: u64, got: u64 },
}

/// Session id and last sequence number
///
/// Written only by the session driver; the heartbeat task and the handle read it.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    session_id: Option<String>,
    last_sequence: Option<u64>,
}

/// Tracker shared between the driver, the heartbeat task and the handle
pub type SharedTracker = Arc<Mutex<SessionTracker>>;

impl SessionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker seeded with a retained identity
    #[must_use]
    pub fn from_identity(identity: SessionIdentity) -> Self {
        Self {
            session_id: Some(identity.session_id),
            last_sequence: Some(identity.last_sequence),
        }
    }

    /// Wrap in a shared handle
    #[must_use]
    pub fn shared(self) -> SharedTracker {
        Arc::new(Mutex::new(self))
    }

    /// Classify an incoming sequence number against the last recorded one
    #[must_use]
    pub fn check(&self, sequence: u64) -> SequenceCheck {
        match self.last_sequence {
            None => SequenceCheck::Next,
            Some(last) if sequence <= last => SequenceCheck::Duplicate,
            Some(last) if sequence == last + 1 => SequenceCheck::Next,
            Some(last) => SequenceCheck::Gap {
                expected: last + 1,
                got: sequence,
            },
        }
    }

    /// Record a sequence number, returning the previous one for [`Self::rollback`]
    pub fn record(&mut self, sequence: u64) -> Option<u64> {
        self.last_sequence.replace(sequence)
    }

    /// Undo a [`Self::record`] whose event was never delivered
    pub fn rollback(&mut self, previous: Option<u64>) {
        self.last_sequence = previous;
    }

    /// Store the session id from Ready
    pub fn establish(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
    }

    /// Forget the session; the next handshake identifies from scratch
    pub fn clear(&mut self) {
        self.session_id = None;
        self.last_sequence = None;
    }

    /// Resumable identity, if both parts are known
    #[must_use]
    pub fn identity(&self) -> Option<SessionIdentity> {
        Some(SessionIdentity {
            session_id: self.session_id.clone()?,
            last_sequence: self.last_sequence?,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.last_sequence
    }
}
