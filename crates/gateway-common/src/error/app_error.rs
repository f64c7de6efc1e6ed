//! Application error types
//!
//! Top-level error handling for the gateway client binary.

use crate::config::ConfigError;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Telemetry errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    // REST API errors (gateway discovery, current user)
    #[error("HTTP error: {0}")]
    Http(String),

    // Gateway session errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 78, // EX_CONFIG
            Self::Telemetry(_) | Self::Internal(_) => 70, // EX_SOFTWARE
            Self::Http(_) | Self::Gateway(_) => 69, // EX_UNAVAILABLE
        }
    }

    /// Get error code for log output
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Telemetry(_) => "TELEMETRY_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create an HTTP error
    #[must_use]
    pub fn http(err: impl fmt::Display) -> Self {
        Self::Http(err.to_string())
    }

    /// Create a gateway error
    #[must_use]
    pub fn gateway(err: impl fmt::Display) -> Self {
        Self::Gateway(err.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
