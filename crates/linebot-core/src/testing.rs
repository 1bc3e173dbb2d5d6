//! Test doubles shared by the workspace's test suites.
//!
//! Enabled for this crate's own tests and, for downstream crates, through the
//! `testing` feature.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::api::{GroupSummary, LineApi, Profile};
use crate::error::{ApiError, ApiResult};
use crate::message::Message;

/// One recorded reply call.
#[derive(Debug, Clone)]
pub struct RecordedReply {
    /// Reply token used.
    pub token: String,
    /// Messages sent.
    pub messages: Vec<Message>,
    /// Whether push notifications were disabled.
    pub notification_disabled: bool,
}

/// A [`LineApi`] that records calls instead of sending them.
#[derive(Debug, Default)]
pub struct MockApi {
    replies: Mutex<Vec<RecordedReply>>,
    profiles: Mutex<HashMap<String, Profile>>,
    profile_calls: AtomicUsize,
    left_groups: Mutex<Vec<String>>,
}

impl MockApi {
    /// Creates a mock behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `profile(user_id)` succeed with a profile named `display_name`.
    pub fn with_profile(self: Arc<Self>, user_id: &str, display_name: &str) -> Arc<Self> {
        self.profiles.lock().insert(
            user_id.to_string(),
            Profile {
                display_name: display_name.to_string(),
                user_id: user_id.to_string(),
                language: None,
                picture_url: None,
                status_message: None,
            },
        );
        self
    }

    /// Replies recorded so far.
    pub fn replies(&self) -> Vec<RecordedReply> {
        self.replies.lock().clone()
    }

    /// Texts of every recorded message, flattened in send order.
    pub fn replied_texts(&self) -> Vec<String> {
        self.replies
            .lock()
            .iter()
            .flat_map(|r| r.messages.iter())
            .filter_map(|m| m.as_text().map(str::to_string))
            .collect()
    }

    /// Number of profile lookups.
    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    /// Groups left so far.
    pub fn left_groups(&self) -> Vec<String> {
        self.left_groups.lock().clone()
    }
}

#[async_trait]
impl LineApi for MockApi {
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[Message],
        notification_disabled: bool,
    ) -> ApiResult<()> {
        self.replies.lock().push(RecordedReply {
            token: reply_token.to_string(),
            messages: messages.to_vec(),
            notification_disabled,
        });
        Ok(())
    }

    async fn profile(&self, user_id: &str) -> ApiResult<Profile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .lock()
            .get(user_id)
            .cloned()
            .ok_or_else(|| ApiError::Platform {
                status: 404,
                message: "Not found".to_string(),
                details: Vec::new(),
            })
    }

    async fn group_summary(&self, group_id: &str) -> ApiResult<GroupSummary> {
        Ok(GroupSummary {
            group_id: group_id.to_string(),
            group_name: "group".to_string(),
            picture_url: None,
        })
    }

    async fn group_member_count(&self, _group_id: &str) -> ApiResult<u64> {
        Ok(3)
    }

    async fn leave_group(&self, group_id: &str) -> ApiResult<()> {
        self.left_groups.lock().push(group_id.to_string());
        Ok(())
    }

    async fn download_content(&self, _message_id: &str, _dir: &Path) -> ApiResult<PathBuf> {
        Err(ApiError::NotSupported("mock API does not download content"))
    }
}

fn envelope(kind: &str, user_id: &str) -> Value {
    json!({
        "type": kind,
        "replyToken": "reply-token",
        "webhookEventId": "01HTESTEVENT",
        "timestamp": 1_700_000_000_000i64,
        "mode": "active",
        "deliveryContext": { "isRedelivery": false },
        "source": { "type": "user", "userId": user_id }
    })
}

/// A raw text message event from `user_id`.
pub fn text_event(text: &str, user_id: &str) -> Value {
    let mut raw = envelope("message", user_id);
    raw["message"] = json!({ "type": "text", "id": "100001", "text": text });
    raw
}

/// A raw postback event carrying `data`, with optional `params`.
pub fn postback_event(data: &str, params: Option<Value>, user_id: &str) -> Value {
    let mut raw = envelope("postback", user_id);
    raw["postback"] = match params {
        Some(params) => json!({ "data": data, "params": params }),
        None => json!({ "data": data }),
    };
    raw
}

/// A raw event of a kind that carries no kind-specific fields.
pub fn bare_event(kind: &str, user_id: &str) -> Value {
    envelope(kind, user_id)
}
