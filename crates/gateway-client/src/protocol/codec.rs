//! Frame codec
//!
//! Converts between text frames and [`GatewayMessage`] envelopes.

use super::{GatewayMessage, OpCode};
use serde::Deserialize;
use serde_json::Value;

/// Errors produced while decoding an inbound frame
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Envelope is missing the op field")]
    MissingOpcode,

    #[error("Unknown op code: {0}")]
    UnknownOpcode(u64),

    #[error("Dispatch is missing its sequence number")]
    MissingSequence,

    #[error("Dispatch is missing its event name")]
    MissingEventName,
}

/// Loosely typed envelope, validated before it becomes a [`GatewayMessage`]
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    op: Option<u64>,
    #[serde(default)]
    d: Option<Value>,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// Encode an envelope into a text frame
///
/// Serializing a `GatewayMessage` cannot fail: every field is plain JSON.
#[must_use]
pub fn encode(message: &GatewayMessage) -> String {
    serde_json::to_string(message).unwrap_or_default()
}

/// Decode a text frame into an envelope
///
/// # Errors
/// Returns an error if the frame is not a JSON object, has no known `op`,
/// or is a dispatch without `s` and `t`.
pub fn decode(frame: &str) -> Result<GatewayMessage, DecodeError> {
    let raw: RawEnvelope = serde_json::from_str(frame)?;

    let op = raw.op.ok_or(DecodeError::MissingOpcode)?;
    let op = u8::try_from(op)
        .ok()
        .and_then(OpCode::from_u8)
        .ok_or(DecodeError::UnknownOpcode(op))?;

    // JSON null and an absent field mean the same thing
    let d = raw.d.filter(|d| !d.is_null());

    if op == OpCode::Dispatch {
        let s = raw.s.ok_or(DecodeError::MissingSequence)?;
        let t = raw.t.ok_or(DecodeError::MissingEventName)?;
        return Ok(GatewayMessage {
            op,
            d,
            s: Some(s),
            t: Some(t),
        });
    }

    Ok(GatewayMessage {
        op,
        d,
        s: raw.s,
        t: raw.t,
    })
}
