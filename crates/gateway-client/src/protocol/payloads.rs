//! Payload definitions
//!
//! Defines the `d` structures of control envelopes exchanged with the gateway.

use gateway_common::PresenceConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Create a Hello payload with the given interval
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Payload for op 2 (Identify)
///
/// Sent by the client to start a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Authentication token
    pub token: String,

    /// Client connection properties
    pub properties: IdentifyProperties,

    /// Presence to apply once the session is ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,

    /// Gateway intents bitfield
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intents: Option<u64>,

    /// Member count above which offline members are omitted from guild payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u16>,
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    pub os: String,

    /// Library or client name
    pub browser: String,

    /// Device name
    pub device: String,
}

impl IdentifyProperties {
    /// Properties describing this library on the current platform
    #[must_use]
    pub fn new() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    /// Set operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// Set browser
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }

    /// Set device name
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to re-attach to a disconnected session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: u64,
}

/// Payload for op 3 (Status Update)
///
/// Also embedded in Identify as the initial presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    /// Unix time in milliseconds since the client went idle
    pub since: Option<i64>,

    /// Activities shown with the status
    #[serde(default)]
    pub activities: Vec<Activity>,

    /// Online status
    pub status: PresenceStatus,

    /// Whether the client is away from keyboard
    #[serde(default)]
    pub afk: bool,
}

impl Presence {
    /// Create a presence with the given status and no activity
    #[must_use]
    pub fn new(status: PresenceStatus) -> Self {
        Self {
            since: None,
            activities: Vec::new(),
            status,
            afk: false,
        }
    }

    /// Online presence with no activity
    #[must_use]
    pub fn online() -> Self {
        Self::new(PresenceStatus::Online)
    }

    /// Idle presence, idle from now
    #[must_use]
    pub fn idle_since_now() -> Self {
        Self {
            since: Some(chrono::Utc::now().timestamp_millis()),
            afk: true,
            ..Self::new(PresenceStatus::Idle)
        }
    }

    /// Add an activity
    #[must_use]
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }
}

impl Default for Presence {
    fn default() -> Self {
        Self::online()
    }
}

impl From<&PresenceConfig> for Presence {
    /// Unknown names fall back to `online` and `game`; the config loader already rejects them.
    fn from(config: &PresenceConfig) -> Self {
        let status = PresenceStatus::from_name(&config.status).unwrap_or(PresenceStatus::Online);
        let mut presence = Self::new(status);

        if let Some(activity) = &config.activity {
            let kind = ActivityType::from_name(&activity.kind).unwrap_or(ActivityType::Game);
            presence.activities.push(Activity {
                name: activity.name.clone(),
                kind,
                url: activity.url.clone(),
            });
        }

        presence
    }
}

/// Online status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Dnd,
    Idle,
    Invisible,
    Offline,
}

impl PresenceStatus {
    /// Parse a status name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "online" => Some(Self::Online),
            "dnd" => Some(Self::Dnd),
            "idle" => Some(Self::Idle),
            "invisible" => Some(Self::Invisible),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    /// Get the wire name of this status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Dnd => "dnd",
            Self::Idle => "idle",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity shown next to the presence status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity name
    pub name: String,

    /// Activity type
    #[serde(rename = "type")]
    pub kind: ActivityType,

    /// Stream URL (only meaningful for streaming)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Activity {
    /// Create an activity of the given type
    #[must_use]
    pub fn new(kind: ActivityType, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            url: None,
        }
    }

    /// Set the stream URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Activity types, sent as integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActivityType {
    Game = 0,
    Streaming = 1,
    Listening = 2,
    Watching = 3,
    Custom = 4,
    Competing = 5,
}

impl ActivityType {
    /// Create an `ActivityType` from a raw integer value
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Game),
            1 => Some(Self::Streaming),
            2 => Some(Self::Listening),
            3 => Some(Self::Watching),
            4 => Some(Self::Custom),
            5 => Some(Self::Competing),
            _ => None,
        }
    }

    /// Parse a lowercase activity type name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "game" => Some(Self::Game),
            "streaming" => Some(Self::Streaming),
            "listening" => Some(Self::Listening),
            "watching" => Some(Self::Watching),
            "custom" => Some(Self::Custom),
            "competing" => Some(Self::Competing),
            _ => None,
        }
    }
}

impl Serialize for ActivityType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid activity type: {value}")))
    }
}
