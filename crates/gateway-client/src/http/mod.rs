//! REST collaborator
//!
//! Discovers the gateway URL and fetches the authenticated user. Only used
//! before a session starts; the session itself never talks HTTP.

mod client;
mod error;

pub use client::{gateway_endpoint, GatewayInfo, RestClient};
pub use error::{HttpError, HttpResult};
