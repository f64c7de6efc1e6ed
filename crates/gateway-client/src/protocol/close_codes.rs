//! Gateway close codes
//!
//! Known close codes and the table deciding how the session reacts to each one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Gateway-specific WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error occurred
    UnknownError = 4000,
    /// Invalid opcode sent
    UnknownOpcode = 4001,
    /// Invalid payload encoding
    DecodeError = 4002,
    /// Sent payload before Identify
    NotAuthenticated = 4003,
    /// Invalid token provided
    AuthenticationFailed = 4004,
    /// Sent Identify twice
    AlreadyAuthenticated = 4005,
    /// Invalid sequence number for Resume
    InvalidSequence = 4007,
    /// Too many requests (rate limited)
    RateLimited = 4008,
    /// Session has timed out
    SessionTimeout = 4009,
    /// Invalid shard configuration
    InvalidShard = 4010,
    /// Sharding is required
    ShardingRequired = 4011,
    /// Invalid/outdated API version
    InvalidApiVersion = 4012,
    /// Invalid intents value
    InvalidIntents = 4013,
    /// Intents not enabled for this application
    DisallowedIntents = 4014,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimeout),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Default reaction of the session to this close code
    #[must_use]
    pub const fn default_action(self) -> CloseAction {
        match self {
            Self::UnknownError
            | Self::UnknownOpcode
            | Self::DecodeError
            | Self::AlreadyAuthenticated
            | Self::RateLimited => CloseAction::Resume,
            Self::NotAuthenticated | Self::InvalidSequence | Self::SessionTimeout => {
                CloseAction::Reidentify
            }
            Self::AuthenticationFailed
            | Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidApiVersion
            | Self::InvalidIntents
            | Self::DisallowedIntents => CloseAction::Fatal,
        }
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error occurred",
            Self::UnknownOpcode => "Invalid opcode sent",
            Self::DecodeError => "Invalid payload encoding",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::InvalidSequence => "Invalid sequence number",
            Self::RateLimited => "Rate limited",
            Self::SessionTimeout => "Session timeout",
            Self::InvalidShard => "Invalid shard configuration",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intents",
            Self::DisallowedIntents => "Disallowed intents",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

/// What the session does after the transport closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseAction {
    /// Reconnect and resume the retained session
    Resume,
    /// Reconnect, drop the session identity and identify from scratch
    Reidentify,
    /// Stop the session and report a terminal error
    Fatal,
}

/// Classification table from transport close codes to [`CloseAction`]
///
/// Codes missing from the table are classified as [`CloseAction::Reidentify`]:
/// an unknown close is never trusted to keep the session resumable.
/// A transport that dropped without a close frame is classified as
/// [`CloseAction::Resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseClassifier {
    table: HashMap<u16, CloseAction>,
    unknown: CloseAction,
}

impl CloseClassifier {
    /// Standard WebSocket codes that are recovered by resuming
    const RESUMABLE_STANDARD_CODES: &'static [u16] = &[1001, 1006, 1011, 1012];

    /// Create a classifier with the default table
    #[must_use]
    pub fn new() -> Self {
        let gateway_codes = (4000..=4014)
            .filter_map(CloseCode::from_u16)
            .map(|code| (code.as_u16(), code.default_action()));
        let standard_codes = Self::RESUMABLE_STANDARD_CODES
            .iter()
            .map(|&code| (code, CloseAction::Resume));

        let mut table: HashMap<u16, CloseAction> = gateway_codes.chain(standard_codes).collect();
        table.insert(1000, CloseAction::Reidentify);

        Self {
            table,
            unknown: CloseAction::Reidentify,
        }
    }

    /// Override the action for one close code
    #[must_use]
    pub fn with_action(mut self, code: u16, action: CloseAction) -> Self {
        self.table.insert(code, action);
        self
    }

    /// Override the action for several close codes
    #[must_use]
    pub fn with_actions(mut self, codes: &[u16], action: CloseAction) -> Self {
        for &code in codes {
            self.table.insert(code, action);
        }
        self
    }

    /// Classify a transport close
    #[must_use]
    pub fn classify(&self, code: Option<u16>) -> CloseAction {
        match code {
            None => CloseAction::Resume,
            Some(code) => self.table.get(&code).copied().unwrap_or(self.unknown),
        }
    }
}

impl Default for CloseClassifier {
    fn default() -> Self {
        Self::new()
    }
}
