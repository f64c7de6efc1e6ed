//! # gateway-common
//!
//! Shared utilities for the gateway client: configuration, error handling, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    ActivityConfig, ApiConfig, AppConfig, AppSettings, CloseCodeOverrides, ConfigError,
    Environment, GatewayConfig, LogFormat, PresenceConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
