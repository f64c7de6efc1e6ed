//! REST client error types

use reqwest::StatusCode;

/// Errors from REST calls
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Request could not be sent or the response body could not be read
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success response
    #[error("API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Response body did not match the expected shape
    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// Check if the API rejected the token
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }
}

/// Result type alias for REST operations
pub type HttpResult<T> = Result<T, HttpError>;
