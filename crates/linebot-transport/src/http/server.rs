//! Webhook HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use linebot_core::{SIGNATURE_HEADER, SignatureValidator, WebhookHandler, WebhookPayload};

use crate::error::{TransportError, TransportResult};

/// Default webhook route.
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhook";

/// Body of the liveness `GET`.
const LIVENESS_BODY: &str = "LINE Bot";

/// Shared state for the webhook route.
struct ServerState {
    validator: SignatureValidator,
    handler: Arc<dyn WebhookHandler>,
}

/// Receives webhook requests, checks their signature and hands the payload
/// to a [`WebhookHandler`].
///
/// The response is written only after the handler returned, so every event
/// of a batch has been dispatched by the time the platform sees `200`.
pub struct WebhookServer {
    path: String,
    state: Arc<ServerState>,
}

impl WebhookServer {
    /// Creates a server for `channel_secret` that feeds `handler`.
    pub fn new(channel_secret: impl AsRef<[u8]>, handler: Arc<dyn WebhookHandler>) -> Self {
        Self {
            path: DEFAULT_WEBHOOK_PATH.to_string(),
            state: Arc::new(ServerState {
                validator: SignatureValidator::new(channel_secret),
                handler,
            }),
        }
    }

    /// Sets the webhook route. A missing leading `/` is added.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    /// The webhook route.
    pub fn webhook_path(&self) -> &str {
        &self.path
    }

    /// Builds the axum router.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.path, get(liveness).post(webhook))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds `addr` and serves until `shutdown` is cancelled.
    pub async fn serve(self, addr: &str, shutdown: CancellationToken) -> TransportResult<()> {
        let listener = bind(addr).await?;
        let local = listener.local_addr()?;
        info!(addr = %local, path = %self.path, "Webhook server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Webhook server stopped");
        Ok(())
    }

    /// Binds `addr` and serves on a background task.
    ///
    /// Binding happens before this returns, so the reported address is live.
    pub async fn spawn(self, addr: &str) -> TransportResult<ServerHandle> {
        let listener = bind(addr).await?;
        let local = listener.local_addr()?;
        info!(addr = %local, path = %self.path, "Webhook server listening");

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let router = self.router();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = server.await {
                error!(error = %e, "Webhook server error");
            }
            info!("Webhook server stopped");
        });

        Ok(ServerHandle {
            addr: local,
            shutdown,
            task,
        })
    }
}

impl std::fmt::Debug for WebhookServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookServer")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

async fn bind(addr: &str) -> TransportResult<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Handle to a server started with [`WebhookServer::spawn`].
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// A token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops accepting requests and waits for in-flight ones.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Webhook server task failed");
        }
    }
}

// =============================================================================
// Routes
// =============================================================================

async fn liveness() -> &'static str {
    LIVENESS_BODY
}

async fn webhook(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER.to_ascii_lowercase())
        .and_then(|v| v.to_str().ok());
    if !state.validator.validate(&body, signature) {
        warn!(len = body.len(), "Rejected webhook with invalid signature");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "Unauthorized", "message": "Invalid signature" })),
        )
            .into_response();
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Rejected undecodable webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "Bad Request", "message": e.to_string() })),
            )
                .into_response();
        }
    };

    if payload.events.is_empty() {
        // Verification pings carry no events.
        debug!(destination = %payload.destination, "Webhook acknowledged");
        state.handler.handle_payload(payload).await;
        return (StatusCode::OK, Json(json!({ "status": "Okay" }))).into_response();
    }

    debug!(
        destination = %payload.destination,
        events = payload.events.len(),
        "Webhook received"
    );
    state.handler.handle_payload(payload).await;
    (
        StatusCode::OK,
        Json(json!({ "status": "OK", "message": "Request accepted" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use parking_lot::Mutex;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    const SECRET: &str = "channel-secret";

    #[derive(Default)]
    struct Recorder {
        payloads: Mutex<Vec<WebhookPayload>>,
    }

    #[async_trait]
    impl WebhookHandler for Recorder {
        async fn handle_payload(&self, payload: WebhookPayload) {
            self.payloads.lock().push(payload);
        }
    }

    fn server() -> (WebhookServer, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (WebhookServer::new(SECRET, recorder.clone()), recorder)
    }

    fn signed_post(path: &str, body: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(path);
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn sign(body: &str) -> Option<String> {
        Some(SignatureValidator::new(SECRET).sign(body.as_bytes()))
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn liveness_get() {
        let (server, _) = server();
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/webhook")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"LINE Bot");
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_before_dispatch() {
        let (server, recorder) = server();
        let body = r#"{"destination":"U","events":[{"type":"follow"}]}"#;

        let response = server
            .router()
            .oneshot(signed_post("/webhook", body, Some("bm9wZQ==".into())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = server
            .router()
            .oneshot(signed_post("/webhook", body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(recorder.payloads.lock().is_empty());
    }

    #[tokio::test]
    async fn undecodable_body_is_bad_request() {
        let (server, recorder) = server();
        let body = "not json";
        let response = server
            .router()
            .oneshot(signed_post("/webhook", body, sign(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(recorder.payloads.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_acknowledged() {
        let (server, recorder) = server();
        let body = r#"{"destination":"Ubot","events":[]}"#;
        let response = server
            .router()
            .oneshot(signed_post("/webhook", body, sign(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "Okay" }));
        assert_eq!(recorder.payloads.lock()[0].destination, "Ubot");
    }

    #[tokio::test]
    async fn events_are_handed_over_before_responding() {
        let (server, recorder) = server();
        let body = r#"{"destination":"Ubot","events":[{"type":"follow"},{"type":"unfollow"}]}"#;
        let response = server
            .router()
            .oneshot(signed_post("/webhook", body, sign(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "status": "OK", "message": "Request accepted" })
        );
        assert_eq!(recorder.payloads.lock()[0].events.len(), 2);
    }

    #[tokio::test]
    async fn custom_path_without_slash() {
        let recorder = Arc::new(Recorder::default());
        let server = WebhookServer::new(SECRET, recorder).path("callback");
        assert_eq!(server.webhook_path(), "/callback");
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/callback")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn spawned_server_shuts_down() {
        let (server, _) = server();
        let handle = server.spawn("127.0.0.1:0").await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        handle.shutdown().await;
    }
}
