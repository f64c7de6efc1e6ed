//! Configuration structs

mod app_config;

pub use app_config::{
    ActivityConfig, ApiConfig, AppConfig, AppSettings, CloseCodeOverrides, ConfigError,
    Environment, GatewayConfig, LogFormat, PresenceConfig,
};
