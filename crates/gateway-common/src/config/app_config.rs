//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub api: ApiConfig,
    pub gateway: GatewayConfig,
    pub presence: PresenceConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// REST API configuration (used for gateway discovery)
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Bot token, shared by REST calls and the gateway handshake
    pub token: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Gateway session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Explicit gateway URL; when unset the URL is discovered through the REST API
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_gateway_version")]
    pub version: u8,
    #[serde(default = "default_gateway_encoding")]
    pub encoding: String,
    #[serde(default = "default_intents")]
    pub intents: u64,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub close_codes: CloseCodeOverrides,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            version: default_gateway_version(),
            encoding: default_gateway_encoding(),
            intents: default_intents(),
            event_buffer: default_event_buffer(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            close_codes: CloseCodeOverrides::default(),
        }
    }
}

/// Per-code overrides of the close code classification table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CloseCodeOverrides {
    #[serde(default)]
    pub resume: Vec<u16>,
    #[serde(default)]
    pub reidentify: Vec<u16>,
    #[serde(default)]
    pub fatal: Vec<u16>,
}

impl CloseCodeOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resume.is_empty() && self.reidentify.is_empty() && self.fatal.is_empty()
    }
}

/// Initial presence sent with Identify
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_presence_status")]
    pub status: String,
    #[serde(default)]
    pub activity: Option<ActivityConfig>,
}

impl PresenceConfig {
    /// Valid status values
    pub const VALID_STATUSES: &'static [&'static str] =
        &["online", "dnd", "idle", "invisible", "offline"];

    /// Valid activity types
    pub const VALID_ACTIVITY_TYPES: &'static [&'static str] =
        &["game", "streaming", "listening", "watching", "custom", "competing"];
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            status: default_presence_status(),
            activity: None,
        }
    }
}

/// Activity shown alongside the presence status
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityConfig {
    pub name: String,
    #[serde(default = "default_activity_type")]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
}

// Default value functions
fn default_app_name() -> String {
    "gateway-client".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_api_timeout_secs() -> u64 {
    10
}

fn default_gateway_version() -> u8 {
    10
}

fn default_gateway_encoding() -> String {
    "json".to_string()
}

fn default_intents() -> u64 {
    513 // GUILDS | GUILD_MESSAGES
}

fn default_event_buffer() -> usize {
    256
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_connect_timeout_ms() -> u64 {
    15_000
}

fn default_presence_status() -> String {
    "online".to_string()
}

fn default_activity_type() -> String {
    "game".to_string()
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("GATEWAY_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("GATEWAY_TOKEN"))?;

        let env = match lookup("APP_ENV") {
            Some(value) => Environment::parse(&value)
                .ok_or(ConfigError::InvalidValue("APP_ENV", value))?,
            None => default_env(),
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => {
                LogFormat::parse(&value).ok_or(ConfigError::InvalidValue("LOG_FORMAT", value))?
            }
            None if env.is_production() => LogFormat::Json,
            None => LogFormat::Pretty,
        };

        let status = lookup("PRESENCE_STATUS").unwrap_or_else(default_presence_status);
        if !PresenceConfig::VALID_STATUSES.contains(&status.as_str()) {
            return Err(ConfigError::InvalidValue("PRESENCE_STATUS", status));
        }

        let activity = match lookup("PRESENCE_ACTIVITY_NAME") {
            Some(name) => {
                let kind = lookup("PRESENCE_ACTIVITY_TYPE").unwrap_or_else(default_activity_type);
                if !PresenceConfig::VALID_ACTIVITY_TYPES.contains(&kind.as_str()) {
                    return Err(ConfigError::InvalidValue("PRESENCE_ACTIVITY_TYPE", kind));
                }
                Some(ActivityConfig {
                    name,
                    kind,
                    url: lookup("PRESENCE_ACTIVITY_URL"),
                })
            }
            None => None,
        };

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env,
                log_level: lookup("LOG_LEVEL").unwrap_or_else(default_log_level),
                log_format,
            },
            api: ApiConfig {
                base_url: lookup("API_BASE_URL").unwrap_or_else(default_api_base_url),
                token,
                timeout_secs: parse_var(&lookup, "API_TIMEOUT_SECS", default_api_timeout_secs)?,
            },
            gateway: GatewayConfig {
                url: lookup("GATEWAY_URL").filter(|u| !u.trim().is_empty()),
                version: parse_var(&lookup, "GATEWAY_VERSION", default_gateway_version)?,
                encoding: lookup("GATEWAY_ENCODING").unwrap_or_else(default_gateway_encoding),
                intents: parse_var(&lookup, "GATEWAY_INTENTS", default_intents)?,
                event_buffer: parse_var(&lookup, "GATEWAY_EVENT_BUFFER", default_event_buffer)?,
                max_reconnect_attempts: parse_var(
                    &lookup,
                    "GATEWAY_MAX_RECONNECT_ATTEMPTS",
                    default_max_reconnect_attempts,
                )?,
                backoff_base_ms: parse_var(
                    &lookup,
                    "GATEWAY_BACKOFF_BASE_MS",
                    default_backoff_base_ms,
                )?,
                backoff_max_ms: parse_var(&lookup, "GATEWAY_BACKOFF_MAX_MS", default_backoff_max_ms)?,
                connect_timeout_ms: parse_var(
                    &lookup,
                    "GATEWAY_CONNECT_TIMEOUT_MS",
                    default_connect_timeout_ms,
                )?,
                close_codes: CloseCodeOverrides {
                    resume: parse_code_list(&lookup, "GATEWAY_RESUME_CLOSE_CODES")?,
                    reidentify: parse_code_list(&lookup, "GATEWAY_REIDENTIFY_CLOSE_CODES")?,
                    fatal: parse_code_list(&lookup, "GATEWAY_FATAL_CLOSE_CODES")?,
                },
            },
            presence: PresenceConfig { status, activity },
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: fn() -> T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, value)),
        None => Ok(default()),
    }
}

fn parse_code_list<F>(lookup: &F, name: &'static str) -> Result<Vec<u16>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(Vec::new());
    };

    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue(name, value.clone()))
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
