//! REST client for the messaging platform.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use linebot_core::{
    ApiError, ApiResult, ErrorDetail, GroupSummary, LineApi, Message, Profile, extension_for,
};

use crate::error::{TransportError, TransportResult};

/// Base URL of the messaging API.
pub const DEFAULT_API_BASE: &str = "https://api.line.me";
/// Base URL of the content API.
pub const DEFAULT_DATA_BASE: &str = "https://api-data.line.me";
/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`LineApi`] over HTTPS with a channel access token.
#[derive(Clone)]
pub struct HttpLineApi {
    client: Client,
    access_token: String,
    api_base: String,
    data_base: String,
}

impl HttpLineApi {
    /// Creates a client with the default endpoints and timeout.
    pub fn new(access_token: impl Into<String>) -> TransportResult<Self> {
        Self::builder(access_token).build()
    }

    /// Starts a builder.
    pub fn builder(access_token: impl Into<String>) -> HttpLineApiBuilder {
        HttpLineApiBuilder {
            access_token: access_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            data_base: DEFAULT_DATA_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn data_url(&self, path: &str) -> String {
        format!("{}{}", self.data_base, path)
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(platform_error(status.as_u16(), &body))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: String) -> ApiResult<T> {
        trace!(url = %url, "GET");
        let response = self.send(self.client.get(&url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl std::fmt::Debug for HttpLineApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLineApi")
            .field("api_base", &self.api_base)
            .field("data_base", &self.data_base)
            .finish_non_exhaustive()
    }
}

/// Builder for [`HttpLineApi`].
#[derive(Debug, Clone)]
pub struct HttpLineApiBuilder {
    access_token: String,
    api_base: String,
    data_base: String,
    timeout: Duration,
}

impl HttpLineApiBuilder {
    /// Overrides the messaging API base URL.
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the content API base URL.
    pub fn data_base(mut self, url: impl Into<String>) -> Self {
        self.data_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the client.
    pub fn build(self) -> TransportResult<HttpLineApi> {
        let client = ClientBuilder::new()
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(HttpLineApi {
            client,
            access_token: self.access_token,
            api_base: self.api_base,
            data_base: self.data_base,
        })
    }
}

#[derive(Deserialize)]
struct PlatformErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

/// Turns a non-2xx response body into [`ApiError::Platform`].
///
/// Bodies that are not the platform's error JSON become the message as-is.
pub(crate) fn platform_error(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<PlatformErrorBody>(body) {
        Ok(parsed) => ApiError::Platform {
            status,
            message: parsed.message,
            details: parsed.details,
        },
        Err(_) => ApiError::Platform {
            status,
            message: body.to_string(),
            details: Vec::new(),
        },
    }
}

fn reply_body(
    reply_token: &str,
    messages: &[Message],
    notification_disabled: bool,
) -> serde_json::Value {
    json!({
        "replyToken": reply_token,
        "messages": messages.iter().map(Message::to_value).collect::<Vec<_>>(),
        "notificationDisabled": notification_disabled,
    })
}

#[derive(Deserialize)]
struct MemberCount {
    count: u64,
}

#[async_trait]
impl LineApi for HttpLineApi {
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[Message],
        notification_disabled: bool,
    ) -> ApiResult<()> {
        debug!(messages = messages.len(), notification_disabled, "Sending reply");
        let body = reply_body(reply_token, messages, notification_disabled);
        self.send(self.client.post(self.api_url("/v2/bot/message/reply")).json(&body))
            .await?;
        Ok(())
    }

    async fn profile(&self, user_id: &str) -> ApiResult<Profile> {
        self.get_json(self.api_url(&format!("/v2/bot/profile/{user_id}")))
            .await
    }

    async fn group_summary(&self, group_id: &str) -> ApiResult<GroupSummary> {
        self.get_json(self.api_url(&format!("/v2/bot/group/{group_id}/summary")))
            .await
    }

    async fn group_member_count(&self, group_id: &str) -> ApiResult<u64> {
        let count: MemberCount = self
            .get_json(self.api_url(&format!("/v2/bot/group/{group_id}/members/count")))
            .await?;
        Ok(count.count)
    }

    async fn leave_group(&self, group_id: &str) -> ApiResult<()> {
        debug!(group_id, "Leaving group");
        self.send(
            self.client
                .post(self.api_url(&format!("/v2/bot/group/{group_id}/leave"))),
        )
        .await?;
        Ok(())
    }

    async fn download_content(&self, message_id: &str, dir: &Path) -> ApiResult<PathBuf> {
        let url = self.data_url(&format!("/v2/bot/message/{message_id}/content"));
        let mut response = self.send(self.client.get(&url)).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let path = dir.join(format!("{message_id}.{}", extension_for(&content_type)));

        tokio::fs::create_dir_all(dir).await?;
        let written = match save_body(&mut response, &path).await {
            Ok(written) => written,
            Err(err) => {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial download");
                }
                return Err(err);
            }
        };

        debug!(message_id, path = %path.display(), bytes = written, "Content downloaded");
        Ok(path)
    }
}

/// Streams the response body into a new file at `path`.
async fn save_body(response: &mut Response, path: &Path) -> ApiResult<usize> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0usize;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?
    {
        written += chunk.len();
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_error_parses_details() {
        let body = r#"{"message":"The request body has 1 error(s)","details":[{"message":"May not be empty","property":"messages[0].text"}]}"#;
        match platform_error(400, body) {
            ApiError::Platform {
                status,
                message,
                details,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "The request body has 1 error(s)");
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].property, "messages[0].text");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn platform_error_keeps_non_json_bodies() {
        match platform_error(502, "Bad Gateway") {
            ApiError::Platform {
                message, details, ..
            } => {
                assert_eq!(message, "Bad Gateway");
                assert!(details.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reply_body_uses_platform_field_names() {
        let body = reply_body("tok", &[Message::text("hi")], true);
        assert_eq!(body["replyToken"], "tok");
        assert_eq!(body["notificationDisabled"], true);
        assert_eq!(body["messages"][0]["type"], "text");
        assert_eq!(body["messages"][0]["text"], "hi");
    }

    #[test]
    fn builder_trims_trailing_slashes() {
        let api = HttpLineApi::builder("token")
            .api_base("http://localhost:9000/")
            .data_base("http://localhost:9001/")
            .build()
            .unwrap();
        assert_eq!(
            api.api_url("/v2/bot/profile/U1"),
            "http://localhost:9000/v2/bot/profile/U1"
        );
        assert_eq!(
            api.data_url("/v2/bot/message/1/content"),
            "http://localhost:9001/v2/bot/message/1/content"
        );
    }

    #[tokio::test]
    async fn interrupted_download_leaves_no_file() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            // promises 1000 bytes, sends 7, then hangs up
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: 1000\r\n\r\npartial",
                )
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        let dir = std::env::temp_dir().join(format!("linebot-partial-{}", std::process::id()));
        let api = HttpLineApi::builder("token")
            .data_base(format!("http://{addr}"))
            .build()
            .unwrap();

        let err = api.download_content("m1", &dir).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(!dir.join("m1.jpg").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
