//! Error types for the linebot framework.

use std::time::Duration;

use thiserror::Error;

/// Errors raised when registering handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The dispatcher already served an event.
    #[error("handler registry is sealed; register handlers before serving starts")]
    Sealed,

    /// `ready` handlers take no event; use `on_ready`.
    #[error("the ready kind carries no event object; register it with on_ready")]
    ReadyHasNoEvent,
}

/// Why one handler unit failed.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error(transparent)]
    Failed(anyhow::Error),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The handler exceeded the dispatch timeout.
    #[error("handler timed out after {0:?}")]
    TimedOut(Duration),
}

/// Errors from routing a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A required argument was not given and has no default.
    #[error("missing argument '{name}'")]
    MissingArgument {
        /// Parameter name.
        name: String,
    },

    /// A token could not be converted to the parameter's type.
    #[error("invalid value '{value}' for argument '{name}': expected {expected}")]
    InvalidArgument {
        /// Parameter name.
        name: String,
        /// Offending token.
        value: String,
        /// Expected type name.
        expected: &'static str,
    },

    /// The command body failed.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl CommandError {
    /// Whether this is an argument error rather than a body failure.
    pub fn is_argument_error(&self) -> bool {
        !matches!(self, Self::Handler(_))
    }
}

/// Result type for registration.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for command routing.
pub type CommandResult<T> = Result<T, CommandError>;
