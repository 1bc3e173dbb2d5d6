//! # linebot core
//!
//! The model layer of the linebot webhook SDK.
//!
//! This crate knows nothing about HTTP or handler registries. It provides:
//!
//! - **Signatures**: [`SignatureValidator`] checks `X-Line-Signature`
//! - **Events**: [`classify`]/[`parse`] turn raw JSON into an [`Event`]
//!   of a closed [`EventKind`], with the reply-once bookkeeping on the event
//! - **Messages**: outbound [`Message`] builders and [`IntoMessages`]
//! - **API seam**: the [`LineApi`] trait implemented by the HTTP client
//! - **Store**: the [`KeyValueStore`] trait and the in-memory [`MemoryStore`]
//!
//! ```text
//! body ──▶ SignatureValidator ──▶ WebhookPayload ──▶ parse ──▶ Event ──▶ handlers
//!                                                              │
//!                                                   LineApi ◀──┘ reply
//! ```

pub mod api;
pub mod error;
pub mod event;
pub mod message;
pub mod signature;
pub mod store;
pub mod webhook;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{BoxedApi, GroupSummary, LineApi, Profile, extension_for};
pub use error::{
    ApiError, ApiResult, ErrorDetail, EventError, EventResult, ReplyError, ReplyResult,
};
pub use event::{
    ACTION_DATA_NAMESPACE, Event, EventKind, EventMeta, EventPayload, ParsedEvent,
    PostbackContent, PostbackParams, PostbackVariant, Source, classify, parse,
};
pub use message::{IntoMessages, MAX_REPLY_MESSAGES, Message};
pub use signature::{SIGNATURE_HEADER, SignatureValidator};
pub use store::{BoxedStore, KeyValueStore, MemoryStore};
pub use webhook::{WebhookHandler, WebhookPayload};
