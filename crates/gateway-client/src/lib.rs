//! # gateway-client
//!
//! Client for a real-time gateway: keeps one logical session alive across
//! connection drops, heartbeats, resumes where it can, and hands dispatch
//! events to the caller in order.

pub mod events;
pub mod heartbeat;
pub mod http;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod transport;

pub use events::{DispatchEvent, GatewayEvent, GatewayEventType};
pub use http::{gateway_endpoint, HttpError, RestClient};
pub use protocol::{Activity, ActivityType, Presence, PresenceStatus};
pub use session::{
    Credentials, GatewaySession, SessionBuilder, SessionConfig, SessionError, SessionIdentity,
    SessionState,
};
pub use stream::{CloseReason, EventStream};
pub use transport::{Transport, WsTransport};
