//! Unified error types for the linebot core.
//!
//! Framework-level errors (command and registry errors) live in
//! `linebot-framework`; configuration errors live in `linebot-runtime`.

use thiserror::Error;

// =============================================================================
// Event Errors
// =============================================================================

/// Errors raised while classifying or decoding one inbound webhook event.
///
/// These are fatal to the single event only; the webhook boundary logs them
/// and keeps processing the rest of the batch.
#[derive(Debug, Clone, Error)]
pub enum EventError {
    /// The `type` (or `message.type`) discriminator is not a supported kind.
    #[error("unknown event kind: {kind}")]
    UnknownEventKind {
        /// The discriminator value found in the payload.
        kind: String,
    },

    /// The payload is missing a field or has a field of the wrong shape.
    #[error("malformed event payload: {reason}")]
    Malformed {
        /// Reason for failure.
        reason: String,
    },
}

impl EventError {
    /// Creates a malformed-payload error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// One entry of the `details` array in a platform error response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ErrorDetail {
    /// The request property the platform complains about.
    #[serde(default)]
    pub property: String,
    /// Human-readable description.
    #[serde(default)]
    pub message: String,
}

/// Error type for outbound calls to the messaging platform.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The platform answered with a non-2xx status.
    #[error("platform error ({status}): {message}{}", format_details(.details))]
    Platform {
        /// HTTP status code.
        status: u16,
        /// Top-level error message.
        message: String,
        /// Property-level details.
        details: Vec<ErrorDetail>,
    },
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// Failed to serialize/deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Local I/O failure (content download).
    #[error("I/O error: {0}")]
    Io(String),
    /// The configured client cannot perform this call.
    #[error("API call not supported: {0}")]
    NotSupported(&'static str),
}

fn format_details(details: &[ErrorDetail]) -> String {
    details
        .iter()
        .map(|d| format!("\n  • {}: {}", d.property, d.message))
        .collect()
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Reply Errors
// =============================================================================

/// Errors from [`Event::reply`](crate::event::Event::reply).
#[derive(Debug, Clone, Error)]
pub enum ReplyError {
    /// The reply token was already used for this event.
    #[error(
        "reply was already sent for this event; send several messages in one reply \
         or register the handler with queued sending"
    )]
    AlreadyReplied,

    /// The event kind carries no reply token.
    #[error("event '{kind}' has no reply token")]
    NotRepliable {
        /// Kind of the event.
        kind: &'static str,
    },

    /// Reply was called with no messages.
    #[error("reply needs at least one message")]
    EmptyReply,

    /// The outbound reply call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for event classification.
pub type EventResult<T> = Result<T, EventError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for replies.
pub type ReplyResult<T> = Result<T, ReplyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_error_lists_details() {
        let err = ApiError::Platform {
            status: 400,
            message: "The request body has 1 error(s)".into(),
            details: vec![ErrorDetail {
                property: "messages[0].text".into(),
                message: "May not be empty".into(),
            }],
        };
        let text = err.to_string();
        assert!(text.starts_with("platform error (400)"));
        assert!(text.contains("messages[0].text: May not be empty"));
    }
}
