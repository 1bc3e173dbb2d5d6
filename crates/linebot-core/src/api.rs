//! Outbound platform API.
//!
//! The [`LineApi`] trait is the seam between the event model and the REST
//! client. The HTTP implementation lives in `linebot-transport`; tests plug in
//! recording mocks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::message::Message;

/// A user's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Display name.
    pub display_name: String,
    /// User ID.
    pub user_id: String,
    /// Language tag, present only when the user consented.
    #[serde(default)]
    pub language: Option<String>,
    /// Profile image URL.
    #[serde(default)]
    pub picture_url: Option<String>,
    /// Status message.
    #[serde(default)]
    pub status_message: Option<String>,
}

/// Summary of a group chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    /// Group ID.
    pub group_id: String,
    /// Group name.
    pub group_name: String,
    /// Group icon URL.
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// Calls to the messaging platform.
///
/// Every method maps to exactly one REST call. Nothing here retries.
#[async_trait]
pub trait LineApi: Send + Sync + 'static {
    /// Sends `messages` with a one-time reply token.
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[Message],
        notification_disabled: bool,
    ) -> ApiResult<()>;

    /// Fetches a user's profile.
    async fn profile(&self, user_id: &str) -> ApiResult<Profile>;

    /// Fetches a group's summary.
    async fn group_summary(&self, group_id: &str) -> ApiResult<GroupSummary>;

    /// Counts the members of a group.
    async fn group_member_count(&self, group_id: &str) -> ApiResult<u64>;

    /// Makes the bot leave a group.
    async fn leave_group(&self, group_id: &str) -> ApiResult<()>;

    /// Downloads the content of a media message into `dir`.
    ///
    /// The file is named after the message ID; its extension comes from the
    /// response's content type. Returns the written path.
    async fn download_content(&self, message_id: &str, dir: &Path) -> ApiResult<PathBuf>;
}

/// A shared API handle.
pub type BoxedApi = Arc<dyn LineApi>;

/// Maps a `Content-Type` value to a file extension.
pub fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "audio/m4a" | "audio/x-m4a" | "audio/mp4" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/aac" => "aac",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "text/plain" => "txt",
        _ => "bin",
    }
}
