//! Test fixtures and payload generators
//!
//! Provides reusable gateway payloads for integration tests.

use gateway_client::protocol::GatewayMessage;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Heartbeat interval used by scripted gateways
pub const HEARTBEAT_INTERVAL_MS: u64 = 45_000;

/// Token every test session identifies with
pub const TEST_TOKEN: &str = "test-token";

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique session id
pub fn unique_session_id() -> String {
    format!("session-{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// READY payload for `session_id`
pub fn ready_payload(session_id: &str) -> Value {
    json!({
        "v": 10,
        "user": {
            "id": "80351110224678912",
            "username": "test-bot",
            "discriminator": "0",
            "bot": true
        },
        "session_id": session_id,
        "guilds": [{"id": "41771983423143937", "unavailable": true}],
        "resume_gateway_url": "wss://resume.example.com"
    })
}

/// MESSAGE_CREATE payload with `content`
pub fn message_payload(content: &str) -> Value {
    json!({
        "id": "175928847299117063",
        "channel_id": "41771983423143937",
        "author": {"id": "80351110224678912", "username": "someone"},
        "content": content,
        "timestamp": "2024-01-01T00:00:00.000000+00:00"
    })
}

/// READY dispatch at `seq`
pub fn ready(session_id: &str, seq: u64) -> GatewayMessage {
    GatewayMessage::dispatch("READY", seq, ready_payload(session_id))
}

/// MESSAGE_CREATE dispatch at `seq`
pub fn message(content: &str, seq: u64) -> GatewayMessage {
    GatewayMessage::dispatch("MESSAGE_CREATE", seq, message_payload(content))
}

/// RESUMED dispatch at `seq`
pub fn resumed(seq: u64) -> GatewayMessage {
    GatewayMessage::dispatch("RESUMED", seq, Value::Null)
}
