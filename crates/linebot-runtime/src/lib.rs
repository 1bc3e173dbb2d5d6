//! # linebot runtime
//!
//! Process-level glue for the linebot SDK:
//!
//! - Layered configuration ([`ConfigLoader`], [`LinebotConfig`])
//! - Logging setup ([`LoggingBuilder`], [`logging::init_from_config`])
//! - The [`LineClient`], which owns the registry and serves the webhook
//!
//! ```ignore
//! use linebot_runtime::LineClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = LineClient::builder().build()?;
//!     // register handlers...
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;

pub use client::{LineClient, LineClientBuilder};
pub use config::{ConfigError, ConfigLoader, ConfigResult, LinebotConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by bots
pub use tracing;
pub use tracing_subscriber;
