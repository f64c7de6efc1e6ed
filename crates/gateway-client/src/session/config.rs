//! Session configuration

use super::backoff::BackoffConfig;
use crate::protocol::{CloseAction, CloseClassifier, IdentifyProperties};
use gateway_common::GatewayConfig;
use std::fmt;
use std::time::Duration;

/// Tuning for one gateway session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Events buffered for the consumer before the session stops reading
    pub event_buffer: usize,
    /// Frames read ahead while a delivery is blocked on a full event buffer
    pub frame_backlog: usize,
    /// Pending consumer commands (presence updates, forced reconnects)
    pub command_buffer: usize,
    /// Bound on each transport open
    pub connect_timeout: Duration,
    /// Consecutive failed reconnects before giving up
    pub max_reconnect_attempts: u32,
    pub backoff: BackoffConfig,
    /// Random wait before identifying again after a rejected resume
    pub reidentify_delay: (Duration, Duration),
    pub close_codes: CloseClassifier,
    pub properties: IdentifyProperties,
    pub intents: Option<u64>,
    pub large_threshold: Option<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_buffer: 256,
            frame_backlog: 256,
            command_buffer: 32,
            connect_timeout: Duration::from_secs(15),
            max_reconnect_attempts: 10,
            backoff: BackoffConfig::default(),
            reidentify_delay: (Duration::from_secs(1), Duration::from_secs(5)),
            close_codes: CloseClassifier::default(),
            properties: IdentifyProperties::default(),
            intents: None,
            large_threshold: None,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size.max(1);
        self
    }

    #[must_use]
    pub fn with_frame_backlog(mut self, size: usize) -> Self {
        self.frame_backlog = size.max(1);
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_reidentify_delay(mut self, min: Duration, max: Duration) -> Self {
        self.reidentify_delay = (min, max.max(min));
        self
    }

    #[must_use]
    pub fn with_close_codes(mut self, close_codes: CloseClassifier) -> Self {
        self.close_codes = close_codes;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_intents(mut self, intents: u64) -> Self {
        self.intents = Some(intents);
        self
    }
}

impl From<&GatewayConfig> for SessionConfig {
    fn from(config: &GatewayConfig) -> Self {
        let close_codes = CloseClassifier::new()
            .with_actions(&config.close_codes.resume, CloseAction::Resume)
            .with_actions(&config.close_codes.reidentify, CloseAction::Reidentify)
            .with_actions(&config.close_codes.fatal, CloseAction::Fatal);

        Self {
            event_buffer: config.event_buffer.max(1),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
            backoff: BackoffConfig {
                base: Duration::from_millis(config.backoff_base_ms),
                max: Duration::from_millis(config.backoff_max_ms),
                ..BackoffConfig::default()
            },
            close_codes,
            intents: Some(config.intents),
            ..Self::default()
        }
    }
}

/// Credentials sent in Identify and Resume
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
}

impl Credentials {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .finish()
    }
}
