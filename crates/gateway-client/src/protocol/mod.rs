//! Gateway protocol definitions
//!
//! Defines the wire protocol: op codes, envelopes, payloads, close codes and the frame codec.

mod close_codes;
pub mod codec;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseAction, CloseClassifier, CloseCode};
pub use codec::{decode, encode, DecodeError};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, ActivityType, HelloPayload, IdentifyPayload, IdentifyProperties, Presence,
    PresenceStatus, ResumePayload,
};
