//! Configuration for a linebot process.
//!
//! Sources are layered with figment: built-in defaults, then an optional
//! profile file, then `linebot.toml` / `linebot.yaml`, then `LINEBOT_*`
//! environment variables, then programmatic overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ApiConfig, ChannelConfig, DispatchConfig, LinebotConfig, LogFormat, LogLevel, LogOutput,
    LogRotation, LoggingConfig, ServerConfig, SpanEventConfig,
};
pub use validation::validate_config;
