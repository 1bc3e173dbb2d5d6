//! Webhook request body and the seam between transport and dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decoded webhook request body.
///
/// Events stay raw here; each one is classified on its own so a bad event
/// cannot fail the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// User ID of the bot that should receive the events.
    #[serde(default)]
    pub destination: String,
    /// Raw events.
    #[serde(default)]
    pub events: Vec<Value>,
}

/// Consumes validated webhook payloads.
///
/// The HTTP server calls this once per request and answers only after it
/// returns.
#[async_trait]
pub trait WebhookHandler: Send + Sync + 'static {
    /// Processes every event of the payload.
    async fn handle_payload(&self, payload: WebhookPayload);
}
