//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use linebot_framework::RegistryError;
use linebot_transport::TransportError;

/// Errors from building or running a [`LineClient`](crate::LineClient).
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A handler could not be registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The webhook server or REST client failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
