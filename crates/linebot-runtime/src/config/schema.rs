//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use linebot_transport::http::{DEFAULT_API_BASE, DEFAULT_DATA_BASE, DEFAULT_WEBHOOK_PATH};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinebotConfig {
    /// Channel credentials.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Webhook server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Outbound REST settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Channel / Server / API
// =============================================================================

/// Channel credentials issued by the platform console.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Secret used to verify webhook signatures.
    #[serde(default)]
    pub secret: String,

    /// Long-lived channel access token for REST calls.
    #[serde(default)]
    pub access_token: String,
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("secret", &redact(&self.secret))
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() { "<unset>" } else { "<redacted>" }
}

/// Webhook server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Webhook route.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    DEFAULT_WEBHOOK_PATH.to_string()
}

/// Outbound REST configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Messaging API base URL.
    #[serde(default = "default_api_base")]
    pub base_url: String,

    /// Content API base URL.
    #[serde(default = "default_data_base")]
    pub data_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            data_url: default_data_base(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_data_base() -> String {
    DEFAULT_DATA_BASE.to_string()
}

fn default_timeout_ms() -> u64 {
    30000
}

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-handler timeout in milliseconds. `0` disables the timeout.
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,

    /// Fetch the sender's profile before dispatching each event.
    #[serde(default = "default_fetch_profile")]
    pub fetch_profile: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: default_handler_timeout_ms(),
            fetch_profile: default_fetch_profile(),
        }
    }
}

impl DispatchConfig {
    /// The handler timeout, or `None` when disabled.
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_ms > 0).then(|| Duration::from_millis(self.handler_timeout_ms))
    }
}

fn default_handler_timeout_ms() -> u64 {
    5000
}

fn default_fetch_profile() -> bool {
    true
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global level.
    #[serde(default)]
    pub level: LogLevel,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// File rotation policy.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Show thread IDs.
    #[serde(default)]
    pub thread_ids: bool,

    /// Show file and line of each record.
    #[serde(default)]
    pub file_location: bool,

    /// Span lifecycle events to log.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-target levels, e.g. `linebot_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: HashMap::new(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, as used in filter directives.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// The matching `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
///
/// `json` needs the `json-log` feature; without it, it falls back to `full`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events produce log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}
