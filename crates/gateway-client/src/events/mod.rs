//! Gateway events
//!
//! Dispatch events received from the gateway, by name and decoded.

mod event;
mod event_types;
mod payloads;

pub use event::{DispatchEvent, GatewayEvent};
pub use event_types::GatewayEventType;
pub use payloads::{MessageCreateEvent, ReadyEvent, Snowflake, UnavailableGuild, UserPayload};
