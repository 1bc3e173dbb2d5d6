//! Logging setup on `tracing-subscriber`.
//!
//! ```rust,ignore
//! use linebot_runtime::logging::{self, LoggingBuilder, SpanEvents};
//!
//! // From configuration
//! logging::init_from_config(&config.logging);
//!
//! // By hand
//! LoggingBuilder::new()
//!     .directive("linebot_framework=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured base level; per-target
//! directives are still added on top.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// File name used when the configured path has none.
const DEFAULT_LOG_FILE: &str = "linebot.log";

/// Which span lifecycle events are logged.
///
/// Dispatch runs each event inside a `dispatch` span; `LIFECYCLE` shows when
/// each one starts and how long it took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    /// No span events.
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    /// Everything.
    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        use fmt::format::FmtSpan;

        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Initializes logging from configuration. Does nothing if a global
/// subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builds and installs the global subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Compact lines on stdout at `INFO`.
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Never,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }

    /// Mirrors a [`LoggingConfig`].
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new()
            .with_level(config.level.to_tracing_level())
            .format(config.format)
            .output(config.output)
            .rotation(config.rotation)
            .span_events(SpanEvents::from(&config.span_events))
            .with_thread_ids(config.thread_ids)
            .with_file(config.file_location)
            .with_line_number(config.file_location);
        builder.file_path.clone_from(&config.file_path);

        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));
        for (target, level) in filters {
            builder = builder.directive(&format!("{target}={level}"));
        }
        builder
    }

    /// Sets the base level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `linebot_transport=trace`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Span lifecycle events to log.
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Log file for [`LogOutput::File`].
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));
        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("Ignoring invalid log directive {directive:?}: {e}"),
            }
        }
        filter
    }

    /// The writer, and whether file output fell back to stdout.
    fn make_writer(&self) -> (BoxMakeWriter, bool) {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), false),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), false),
            (LogOutput::File, Some(path)) => {
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let name = path
                    .file_name()
                    .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
                let appender = match self.rotation {
                    LogRotation::Never => rolling::never(dir, name),
                    LogRotation::Hourly => rolling::hourly(dir, name),
                    LogRotation::Daily => rolling::daily(dir, name),
                };
                (BoxMakeWriter::new(appender), false)
            }
            (LogOutput::File, None) => (BoxMakeWriter::new(std::io::stdout), true),
        }
    }

    /// Installs the subscriber, keeping an already installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let (writer, fell_back) = self.make_writer();
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.with_target)
            .with_thread_ids(self.with_thread_ids)
            .with_file(self.with_file)
            .with_line_number(self.with_line_number);
        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            LogFormat::Compact => registry.with(layer.compact()).try_init()?,
            LogFormat::Pretty => registry.with(layer.pretty()).try_init()?,
            #[cfg(feature = "json-log")]
            LogFormat::Json => registry.with(layer.json()).try_init()?,
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => {
                registry.with(layer).try_init()?;
                tracing::warn!("JSON logging needs the `json-log` feature, using full format");
            }
            LogFormat::Full => registry.with(layer).try_init()?,
        }

        if fell_back {
            tracing::warn!("File output requested without a file path, logging to stdout");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn span_event_flags() {
        use fmt::format::FmtSpan;

        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(
            SpanEvents::LIFECYCLE.to_fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
    }

    #[test]
    fn from_config_collects_sorted_directives() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            filters: HashMap::from([
                ("linebot_transport".to_string(), LogLevel::Trace),
                ("linebot_framework".to_string(), LogLevel::Debug),
            ]),
            file_location: true,
            ..Default::default()
        };
        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, tracing::Level::WARN);
        assert_eq!(
            builder.directives,
            ["linebot_framework=debug", "linebot_transport=trace"]
        );
        assert!(builder.with_file && builder.with_line_number);
    }

    #[test]
    fn file_output_without_path_falls_back() {
        let builder = LoggingBuilder::new().output(LogOutput::File);
        let (_, fell_back) = builder.make_writer();
        assert!(fell_back);
    }
}
