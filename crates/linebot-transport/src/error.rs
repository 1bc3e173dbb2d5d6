//! Transport errors.

use thiserror::Error;

/// Errors from setting up or running a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
