//! From a validated webhook payload to dispatched events.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{Instrument, Level, debug, span, warn};

use linebot_core::{BoxedApi, BoxedStore, Event, WebhookHandler, WebhookPayload, parse};

use crate::dispatcher::{DispatchReport, Dispatcher};

/// Builds events from raw payloads and hands them to the dispatcher.
///
/// Events of one payload are dispatched concurrently; the call returns once
/// all of them finished.
#[derive(Clone)]
pub struct Pipeline {
    dispatcher: Arc<Dispatcher>,
    api: BoxedApi,
    store: BoxedStore,
    fetch_profile: bool,
}

impl Pipeline {
    /// Creates a pipeline.
    pub fn new(dispatcher: Arc<Dispatcher>, api: BoxedApi, store: BoxedStore) -> Self {
        Self {
            dispatcher,
            api,
            store,
            fetch_profile: true,
        }
    }

    /// Whether to fetch the sender's profile for each event.
    pub fn fetch_profile(mut self, enabled: bool) -> Self {
        self.fetch_profile = enabled;
        self
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Classifies and constructs one event. Bad events are logged and skipped.
    pub async fn build_event(&self, raw: Value) -> Option<Event> {
        let parsed = match parse(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "Skipping webhook event");
                return None;
            }
        };

        let event = Event::new(parsed, Arc::clone(&self.api), Arc::clone(&self.store));
        if !self.fetch_profile {
            return Some(event);
        }

        let profile = match event.author_id() {
            Some(user_id) => match self.api.profile(user_id).await {
                Ok(profile) => Some(profile),
                Err(err) => {
                    warn!(user_id, error = %err, "Failed to fetch sender profile");
                    None
                }
            },
            None => None,
        };
        Some(event.with_author(profile))
    }

    /// Processes every event of `payload`.
    pub async fn process(&self, payload: WebhookPayload) -> Vec<DispatchReport> {
        self.dispatcher.dispatch_ready().await;

        if payload.events.is_empty() {
            debug!("Webhook carried no events");
            return Vec::new();
        }

        let span = span!(Level::DEBUG, "webhook", events = payload.events.len());
        let units = payload.events.into_iter().map(|raw| async move {
            let event = self.build_event(raw).await?;
            Some(self.dispatcher.dispatch(Arc::new(event)).await)
        });
        join_all(units)
            .instrument(span)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

#[async_trait]
impl WebhookHandler for Pipeline {
    async fn handle_payload(&self, payload: WebhookPayload) {
        self.process(payload).await;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("dispatcher", &self.dispatcher)
            .field("fetch_profile", &self.fetch_profile)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::context::EventContext;
    use linebot_core::testing::{MockApi, bare_event, text_event};
    use linebot_core::{EventKind, MemoryStore};

    fn pipeline(api: &Arc<MockApi>) -> Pipeline {
        let store = MemoryStore::shared();
        let dispatcher = Arc::new(Dispatcher::new(store.clone()));
        Pipeline::new(dispatcher, api.clone(), store)
    }

    #[tokio::test]
    async fn bad_events_are_skipped() {
        let api = MockApi::shared();
        let pipeline = pipeline(&api).fetch_profile(false);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        pipeline
            .dispatcher()
            .on(EventKind::Text, move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            })
            .unwrap();

        let payload = WebhookPayload {
            destination: "Ubot".into(),
            events: vec![
                text_event("a", "U1"),
                json!({ "type": "mystery", "timestamp": 1 }),
                text_event("b", "U2"),
                bare_event("follow", "U3"),
            ],
        };
        let reports = pipeline.process(payload).await;
        assert_eq!(reports.len(), 3);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn profiles_are_attached_when_available() {
        let api = MockApi::shared().with_profile("U1", "Ann");
        let pipeline = pipeline(&api);
        let names = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&names);
        pipeline
            .dispatcher()
            .on(EventKind::Text, move |ctx: EventContext| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock()
                        .push(ctx.author().map(|p| p.display_name.clone()));
                    anyhow::Ok(())
                }
            })
            .unwrap();

        let payload = WebhookPayload {
            destination: String::new(),
            events: vec![text_event("hi", "U1")],
        };
        pipeline.process(payload).await;
        let payload = WebhookPayload {
            destination: String::new(),
            events: vec![text_event("hi", "U404")],
        };
        pipeline.process(payload).await;

        assert_eq!(*names.lock(), [Some("Ann".to_string()), None]);
        assert_eq!(api.profile_calls(), 2);
    }

    #[tokio::test]
    async fn ready_fires_on_first_payload_even_without_events() {
        let api = MockApi::shared();
        let pipeline = pipeline(&api);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        pipeline
            .dispatcher()
            .on_ready(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            })
            .unwrap();

        pipeline.handle_payload(WebhookPayload::default()).await;
        pipeline.handle_payload(WebhookPayload::default()).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
