//! Session errors

use crate::transport::TransportError;

/// Terminal session errors
///
/// Cloneable so it can be both logged by the driver and handed to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection attempt timed out")]
    Timeout,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Session invalidated by the gateway and cannot be resumed")]
    InvalidSession,

    #[error("Gateway closed the connection with code {code}: {reason}")]
    Closed { code: u16, reason: String },

    #[error("Gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Session is not running")]
    NotRunning,
}

impl SessionError {
    /// Get error code for log output
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Timeout => "CONNECT_TIMEOUT",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::InvalidSession => "INVALID_SESSION",
            Self::Closed { .. } => "CLOSED",
            Self::ReconnectExhausted { .. } => "RECONNECT_EXHAUSTED",
            Self::NotRunning => "NOT_RUNNING",
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => Self::Timeout,
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
