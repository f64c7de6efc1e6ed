//! Gateway session
//!
//! Connection lifecycle for a single logical session: handshake, resume,
//! reconnect with backoff, and the handle the caller drives it through.

mod backoff;
mod config;
mod driver;
mod error;
mod handle;
mod state;

pub use backoff::{Backoff, BackoffConfig};
pub use config::{Credentials, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use handle::{GatewaySession, SessionBuilder};
pub use state::{SequenceCheck, SessionIdentity, SessionState, SessionTracker, SharedTracker};
