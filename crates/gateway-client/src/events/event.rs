//! Decoded dispatch events
//!
//! What the session pushes onto the event stream.

use super::{GatewayEventType, MessageCreateEvent, ReadyEvent};
use serde_json::Value;

/// A dispatch decoded by event name
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Session established
    Ready(ReadyEvent),

    /// Session resumed; missed events follow
    Resumed,

    /// New message
    MessageCreate(MessageCreateEvent),

    /// Recognized event without a typed payload, or whose payload did not match its type
    Dispatch {
        event_type: GatewayEventType,
        data: Value,
    },

    /// Event name this client does not know about
    Unhandled { name: String, data: Value },
}

impl GatewayEvent {
    /// Decode a dispatch payload by its event name
    ///
    /// Never fails: a payload that doesn't fit its typed shape is kept raw.
    #[must_use]
    pub fn decode(name: &str, data: Value) -> Self {
        let Some(event_type) = GatewayEventType::from_name(name) else {
            return Self::Unhandled {
                name: name.to_string(),
                data,
            };
        };

        let typed = match event_type {
            GatewayEventType::Ready => serde_json::from_value(data.clone()).map(Self::Ready),
            GatewayEventType::Resumed => Ok(Self::Resumed),
            GatewayEventType::MessageCreate => {
                serde_json::from_value(data.clone()).map(Self::MessageCreate)
            }
            _ => return Self::Dispatch { event_type, data },
        };

        typed.unwrap_or_else(|e| {
            tracing::warn!(event = %event_type, error = %e, "Dispatch payload did not match its type");
            Self::Dispatch { event_type, data }
        })
    }

    /// Wire name of the event
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Ready(_) => GatewayEventType::Ready.as_str(),
            Self::Resumed => GatewayEventType::Resumed.as_str(),
            Self::MessageCreate(_) => GatewayEventType::MessageCreate.as_str(),
            Self::Dispatch { event_type, .. } => event_type.as_str(),
            Self::Unhandled { name, .. } => name,
        }
    }

    /// Check if the event name is unknown to this client
    #[must_use]
    pub fn is_unhandled(&self) -> bool {
        matches!(self, Self::Unhandled { .. })
    }
}

/// An event as delivered to the consumer
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    /// Sequence number of the dispatch that carried it
    pub sequence: u64,

    /// Decoded event
    pub event: GatewayEvent,
}

impl DispatchEvent {
    #[must_use]
    pub fn new(sequence: u64, event: GatewayEvent) -> Self {
        Self { sequence, event }
    }

    /// Wire name of the event
    #[must_use]
    pub fn name(&self) -> &str {
        self.event.name()
    }
}
