//! The event object.
//!
//! An [`Event`] is built once per inbound occurrence and shared, through an
//! `Arc`, by every handler of its dispatch cycle. Its fields never change after
//! construction; the only mutable part is the reply bookkeeping.

mod classify;
mod kind;
mod payload;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

pub use classify::{ParsedEvent, classify, parse};
pub use kind::{EventKind, PostbackVariant};
pub use payload::{
    AccountLinkContent, BeaconContent, ContentProvider, DeliveryContext, EventMeta, EventPayload,
    FileContent, LocationContent, MediaContent, Members, PostbackContent, PostbackParams, Source,
    StickerContent, TextContent,
};

use crate::api::{BoxedApi, GroupSummary, Profile};
use crate::error::{ApiError, ApiResult, ReplyError, ReplyResult};
use crate::message::{IntoMessages, MAX_REPLY_MESSAGES, Message};
use crate::store::BoxedStore;

/// Store namespace holding action data, keyed by action token.
pub const ACTION_DATA_NAMESPACE: &str = "action_data";

fn stored_namespace(kind: EventKind) -> String {
    format!("stored:{kind}")
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[derive(Debug, Default)]
struct ReplyState {
    replied: bool,
    queue: Vec<Message>,
    queue_silent: bool,
}

/// One inbound occurrence.
pub struct Event {
    kind: EventKind,
    variant: Option<PostbackVariant>,
    meta: EventMeta,
    payload: EventPayload,
    raw: Value,
    author: Option<Profile>,
    ping_ms: i64,
    api: BoxedApi,
    store: BoxedStore,
    reply: Mutex<ReplyState>,
}

impl Event {
    /// Builds an event from a parsed payload.
    pub fn new(parsed: ParsedEvent, api: BoxedApi, store: BoxedStore) -> Self {
        let ping_ms = now_millis() - parsed.meta.timestamp;
        Self {
            kind: parsed.kind,
            variant: parsed.variant,
            meta: parsed.meta,
            payload: parsed.payload,
            raw: parsed.raw,
            author: None,
            ping_ms,
            api,
            store,
            reply: Mutex::new(ReplyState::default()),
        }
    }

    /// Attaches the sender's profile.
    pub fn with_author(mut self, profile: Option<Profile>) -> Self {
        self.author = profile;
        self
    }

    // ─── Core fields ────────────────────────────────────────────────────────

    /// Dispatch kind.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Refined postback tag.
    pub fn variant(&self) -> Option<PostbackVariant> {
        self.variant
    }

    /// Shared webhook fields.
    pub fn meta(&self) -> &EventMeta {
        &self.meta
    }

    /// Reply token, if the kind carries one.
    pub fn reply_token(&self) -> Option<&str> {
        self.meta.reply_token.as_deref()
    }

    /// Whether the platform redelivered this event.
    pub fn is_redelivery(&self) -> bool {
        self.meta.delivery_context.is_redelivery
    }

    /// Webhook event ID.
    pub fn webhook_event_id(&self) -> &str {
        &self.meta.webhook_event_id
    }

    /// Platform timestamp in milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.meta.timestamp
    }

    /// Channel mode (`active` or `standby`).
    pub fn mode(&self) -> &str {
        &self.meta.mode
    }

    /// Event source.
    pub fn source(&self) -> Option<&Source> {
        self.meta.source.as_ref()
    }

    /// Sender profile, when it was fetched.
    pub fn author(&self) -> Option<&Profile> {
        self.author.as_ref()
    }

    /// Sender user ID, taken from the source.
    pub fn author_id(&self) -> Option<&str> {
        self.source().and_then(Source::user_id)
    }

    /// Kind-specific fields.
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// The payload as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Milliseconds between the platform timestamp and construction.
    pub fn ping(&self) -> i64 {
        self.ping_ms
    }

    /// The outbound API handle.
    pub fn api(&self) -> &BoxedApi {
        &self.api
    }

    /// The correlation store.
    pub fn store(&self) -> &BoxedStore {
        &self.store
    }

    /// Text of a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Text(content) => Some(&content.text),
            _ => None,
        }
    }

    /// Message ID for message events.
    pub fn message_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Text(c) => Some(&c.id),
            EventPayload::Sticker(c) => Some(&c.id),
            EventPayload::Image(c) | EventPayload::Video(c) | EventPayload::Audio(c) => Some(&c.id),
            EventPayload::File(c) => Some(&c.id),
            EventPayload::Location(c) => Some(&c.id),
            _ => None,
        }
    }

    /// Postback content for postback and rich menu switch events.
    pub fn postback(&self) -> Option<&PostbackContent> {
        match &self.payload {
            EventPayload::Postback(content) => Some(content),
            _ => None,
        }
    }

    /// Postback data string.
    pub fn postback_data(&self) -> Option<&str> {
        self.postback().map(|p| p.data.as_str())
    }

    // ─── Reply ──────────────────────────────────────────────────────────────

    /// Replies with `messages`. Fails if this event was already replied to.
    pub async fn reply(&self, messages: impl IntoMessages) -> ReplyResult<()> {
        self.reply_with(messages, false, false).await
    }

    /// Replies with full control over notification and queueing.
    ///
    /// With `queued`, the messages are appended to the send queue and go out
    /// in one call when the dispatch cycle ends.
    pub async fn reply_with(
        &self,
        messages: impl IntoMessages,
        notification_disabled: bool,
        queued: bool,
    ) -> ReplyResult<()> {
        let messages = messages.into_messages();
        if messages.is_empty() {
            return Err(ReplyError::EmptyReply);
        }
        let Some(token) = self.reply_token() else {
            return Err(ReplyError::NotRepliable {
                kind: self.kind.as_str(),
            });
        };

        {
            let mut state = self.reply.lock();
            if queued {
                debug!(kind = %self.kind, count = messages.len(), "Queueing reply");
                state.queue.extend(messages);
                state.queue_silent |= notification_disabled;
                return Ok(());
            }
            if state.replied {
                return Err(ReplyError::AlreadyReplied);
            }
            state.replied = true;
        }

        if messages.len() > MAX_REPLY_MESSAGES {
            warn!(count = messages.len(), "Reply exceeds the per-call message limit");
        }
        self.api
            .reply(token, &messages, notification_disabled)
            .await
            .map_err(ReplyError::from)
    }

    /// Sends everything queued so far as one reply call.
    ///
    /// Returns the number of messages sent; an empty queue sends nothing.
    pub async fn flush_queue(&self) -> ReplyResult<usize> {
        let (messages, silent) = {
            let mut state = self.reply.lock();
            if state.queue.is_empty() {
                return Ok(0);
            }
            let messages = std::mem::take(&mut state.queue);
            if state.replied {
                warn!(
                    kind = %self.kind,
                    dropped = messages.len(),
                    "Reply token already used; dropping queued messages"
                );
                return Err(ReplyError::AlreadyReplied);
            }
            state.replied = true;
            (messages, state.queue_silent)
        };

        let Some(token) = self.reply_token() else {
            return Err(ReplyError::NotRepliable {
                kind: self.kind.as_str(),
            });
        };
        self.api.reply(token, &messages, silent).await?;
        Ok(messages.len())
    }

    /// Whether the reply token was used.
    pub fn has_replied(&self) -> bool {
        self.reply.lock().replied
    }

    /// Number of queued messages not yet sent.
    pub fn queued_len(&self) -> usize {
        self.reply.lock().queue.len()
    }

    // ─── Stored state ───────────────────────────────────────────────────────

    /// Stores `value` under `key` in this kind's bag.
    pub fn remember(&self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.store
            .set(&stored_namespace(self.kind), key, value.into())
    }

    /// Reads a value from this kind's bag.
    pub fn stored(&self, key: &str) -> Option<Value> {
        self.store.get(&stored_namespace(self.kind), key)
    }

    /// Removes a value from this kind's bag.
    pub fn take_stored(&self, key: &str) -> Option<Value> {
        self.store.remove(&stored_namespace(self.kind), key)
    }

    /// Action data registered for this postback's token.
    ///
    /// Readable until the dispatch cycle ends.
    pub fn action_data(&self) -> Option<Value> {
        let token = self.postback_data()?;
        self.store.get(ACTION_DATA_NAMESPACE, token)
    }

    /// One entry of the action data.
    pub fn action_value(&self, key: &str) -> Option<Value> {
        self.action_data()?.get(key).cloned()
    }

    // ─── Platform helpers ───────────────────────────────────────────────────

    fn group_id(&self) -> ApiResult<&str> {
        self.source()
            .and_then(Source::group_id)
            .ok_or(ApiError::NotSupported("event source is not a group"))
    }

    /// Summary of the source group.
    pub async fn group_summary(&self) -> ApiResult<GroupSummary> {
        self.api.group_summary(self.group_id()?).await
    }

    /// Member count of the source group.
    pub async fn group_member_count(&self) -> ApiResult<u64> {
        self.api.group_member_count(self.group_id()?).await
    }

    /// Leaves the source group.
    pub async fn leave_group(&self) -> ApiResult<()> {
        self.api.leave_group(self.group_id()?).await
    }

    /// Downloads this message's content into `dir`.
    pub async fn download_content(&self, dir: &Path) -> ApiResult<PathBuf> {
        match &self.payload {
            EventPayload::Image(_)
            | EventPayload::Video(_)
            | EventPayload::Audio(_)
            | EventPayload::File(_) => {}
            _ => return Err(ApiError::NotSupported("event carries no downloadable content")),
        }
        let id = self
            .message_id()
            .ok_or(ApiError::NotSupported("event has no message id"))?;
        self.api.download_content(id, dir).await
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("variant", &self.variant)
            .field("webhook_event_id", &self.meta.webhook_event_id)
            .field("source", &self.meta.source)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{MockApi, text_event};

    fn event(api: &Arc<MockApi>) -> Event {
        let parsed = parse(text_event("hello", "U1")).unwrap();
        Event::new(parsed, api.clone(), MemoryStore::shared())
    }

    #[tokio::test]
    async fn second_reply_is_a_usage_error() {
        let api = MockApi::shared();
        let event = event(&api);

        event.reply("one").await.unwrap();
        assert!(matches!(
            event.reply("two").await,
            Err(ReplyError::AlreadyReplied)
        ));
        assert_eq!(api.replies().len(), 1);
        assert!(event.has_replied());
    }

    #[tokio::test]
    async fn queued_replies_flush_in_call_order() {
        let api = MockApi::shared();
        let event = event(&api);

        event.reply_with("a", false, true).await.unwrap();
        event.reply_with(vec!["b", "c"], false, true).await.unwrap();
        assert!(api.replies().is_empty());
        assert_eq!(event.flush_queue().await.unwrap(), 3);

        let replies = api.replies();
        assert_eq!(replies.len(), 1);
        let texts: Vec<_> = replies[0].messages.iter().filter_map(Message::as_text).collect();
        assert_eq!(texts, ["a", "b", "c"]);
        assert_eq!(event.flush_queue().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn queue_is_dropped_after_direct_reply() {
        let api = MockApi::shared();
        let event = event(&api);

        event.reply_with("queued", false, true).await.unwrap();
        event.reply("direct").await.unwrap();
        assert!(matches!(
            event.flush_queue().await,
            Err(ReplyError::AlreadyReplied)
        ));
        assert_eq!(api.replies().len(), 1);
        assert_eq!(event.queued_len(), 0);
    }

    #[tokio::test]
    async fn reply_needs_messages_and_a_token() {
        let api = MockApi::shared();
        let event = event(&api);
        assert!(matches!(
            event.reply(Vec::<Message>::new()).await,
            Err(ReplyError::EmptyReply)
        ));

        let mut raw = text_event("x", "U1");
        raw.as_object_mut().unwrap().remove("replyToken");
        let event = Event::new(parse(raw).unwrap(), api.clone(), MemoryStore::shared());
        assert!(matches!(
            event.reply("x").await,
            Err(ReplyError::NotRepliable { kind: "text" })
        ));
    }

    #[tokio::test]
    async fn remember_is_scoped_per_kind() {
        let api = MockApi::shared();
        let store = MemoryStore::shared();
        let event = Event::new(
            parse(text_event("hi", "U1")).unwrap(),
            api.clone(),
            store.clone(),
        );

        event.remember("greeting", "hi");
        assert_eq!(event.stored("greeting"), Some(json!("hi")));
        assert_eq!(store.get("stored:text", "greeting"), Some(json!("hi")));
        assert_eq!(event.take_stored("greeting"), Some(json!("hi")));
        assert_eq!(event.stored("greeting"), None);
    }

    #[test]
    fn accessors() {
        let api = MockApi::shared();
        let event = event(&api);
        assert_eq!(event.kind(), EventKind::Text);
        assert_eq!(event.text(), Some("hello"));
        assert_eq!(event.author_id(), Some("U1"));
        assert_eq!(event.reply_token(), Some("reply-token"));
        assert!(!event.is_redelivery());
        assert!(event.postback().is_none());
        assert!(event.action_data().is_none());
    }
}
