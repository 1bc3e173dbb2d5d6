//! # linebot transport
//!
//! HTTP plumbing for the linebot SDK, split by feature flag.
//!
//! ## Features
//!
//! - `http-server`: [`WebhookServer`], an axum route that validates
//!   `X-Line-Signature` and hands the payload to a
//!   [`WebhookHandler`](linebot_core::WebhookHandler)
//! - `http-client`: [`HttpLineApi`], the reqwest implementation of
//!   [`LineApi`](linebot_core::LineApi)
//! - `full`: both
//!
//! ```text
//! platform ──POST──▶ WebhookServer ──▶ WebhookHandler (pipeline)
//!                                            │
//! platform ◀──REST── HttpLineApi ◀───────────┘ reply / profile / ...
//! ```

pub mod error;

#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-client")]
pub use http::{HttpLineApi, HttpLineApiBuilder};

#[cfg(feature = "http-server")]
pub use http::{ServerHandle, WebhookServer};
