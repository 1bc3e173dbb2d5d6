//! The per-handler view of an event.
//!
//! One [`Event`] is shared by every handler of a dispatch cycle. Each handler
//! gets its own [`EventContext`] carrying that handler's registration options,
//! so the same `reply` call queues for a queued handler and sends directly for
//! the others.

use std::ops::Deref;
use std::sync::Arc;

use linebot_core::{Event, IntoMessages, ReplyResult};

use crate::correlation::Correlation;

/// Context handed to event handlers.
#[derive(Clone)]
pub struct EventContext {
    event: Arc<Event>,
    correlation: Arc<Correlation>,
    queued: bool,
}

impl EventContext {
    /// Creates a context for one handler.
    pub fn new(event: Arc<Event>, correlation: Arc<Correlation>, queued: bool) -> Self {
        Self {
            event,
            correlation,
            queued,
        }
    }

    /// The shared event.
    pub fn event(&self) -> &Arc<Event> {
        &self.event
    }

    /// The correlation registry, for registering postback actions.
    pub fn correlation(&self) -> &Arc<Correlation> {
        &self.correlation
    }

    /// Whether this handler was registered with queued sending.
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Replies to the event, honouring this handler's queueing option.
    pub async fn reply(&self, messages: impl IntoMessages) -> ReplyResult<()> {
        self.event.reply_with(messages, false, self.queued).await
    }

    /// Replies without a push notification.
    pub async fn reply_silently(&self, messages: impl IntoMessages) -> ReplyResult<()> {
        self.event.reply_with(messages, true, self.queued).await
    }
}

impl Deref for EventContext {
    type Target = Event;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext")
            .field("event", &self.event)
            .field("queued", &self.queued)
            .finish_non_exhaustive()
    }
}
