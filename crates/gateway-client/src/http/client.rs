//! REST API client

use super::error::{HttpError, HttpResult};
use crate::events::UserPayload;
use gateway_common::ApiConfig;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Body of `GET /gateway`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
}

/// Client for the REST endpoints the gateway client needs
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    token: String,
}

impl RestClient {
    /// Create a client from API configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> HttpResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up the gateway URL
    pub async fn gateway_url(&self) -> HttpResult<String> {
        let info: GatewayInfo = self.get("/gateway").await?;
        tracing::debug!(url = %info.url, "Gateway URL discovered");
        Ok(info.url)
    }

    /// Fetch the user the token belongs to
    pub async fn current_user(&self) -> HttpResult<UserPayload> {
        self.get("/users/@me").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> HttpResult<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> HttpResult<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "REST request failed");
            return Err(HttpError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Add protocol version and encoding query parameters to a gateway URL
///
/// Existing `v` and `encoding` parameters are replaced; others are kept.
///
/// # Errors
/// Returns [`HttpError::InvalidUrl`] if `url` does not parse.
pub fn gateway_endpoint(url: &str, version: u8, encoding: &str) -> HttpResult<String> {
    let mut parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(format!("{url}: {e}")))?;

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != "v" && key != "encoding")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("v", &version.to_string())
        .append_pair("encoding", encoding);

    Ok(parsed.into())
}
