//! HTTP transport: the webhook server and the REST client.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::{
    DEFAULT_API_BASE, DEFAULT_DATA_BASE, DEFAULT_TIMEOUT, HttpLineApi, HttpLineApiBuilder,
};

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{DEFAULT_WEBHOOK_PATH, ServerHandle, WebhookServer};
