//! Correlation of postback tokens with one-shot handlers and action data.
//!
//! A postback action carries an opaque token in its `data` field. When the
//! action is created the token is mapped to an optional one-shot handler and
//! an optional data bag. The dispatcher takes the handler on the first
//! matching postback and clears the data bag when that dispatch ends.
//!
//! Tokens whose postback never arrives stay registered for the lifetime of
//! the process.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use linebot_core::{ACTION_DATA_NAMESPACE, BoxedStore};

use crate::handler::BoxedHandler;

/// Registry of action tokens.
pub struct Correlation {
    store: BoxedStore,
    actions: Mutex<HashMap<String, BoxedHandler>>,
}

impl Correlation {
    /// Creates a registry whose action data lives in `store`.
    pub fn new(store: BoxedStore) -> Self {
        Self {
            store,
            actions: Mutex::new(HashMap::new()),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &BoxedStore {
        &self.store
    }

    /// Generates a fresh action token.
    pub fn new_token() -> String {
        Uuid::new_v4().to_string()
    }

    /// Registers a handler and/or data under a fresh token and returns it.
    pub fn register(&self, handler: Option<BoxedHandler>, data: Option<Value>) -> String {
        let token = Self::new_token();
        self.register_token(&token, handler, data);
        token
    }

    /// Registers a handler and/or data under `token`.
    ///
    /// An existing entry for the same token is replaced.
    pub fn register_token(&self, token: &str, handler: Option<BoxedHandler>, data: Option<Value>) {
        if let Some(handler) = handler {
            self.actions.lock().insert(token.to_string(), handler);
        }
        if let Some(data) = data {
            self.store.set(ACTION_DATA_NAMESPACE, token, data);
        }
        debug!(token, "Registered action");
    }

    /// Removes and returns the one-shot handler for `token`.
    pub fn take_handler(&self, token: &str) -> Option<BoxedHandler> {
        self.actions.lock().remove(token)
    }

    /// Whether a one-shot handler is waiting on `token`.
    pub fn has_handler(&self, token: &str) -> bool {
        self.actions.lock().contains_key(token)
    }

    /// Action data registered for `token`.
    pub fn data(&self, token: &str) -> Option<Value> {
        self.store.get(ACTION_DATA_NAMESPACE, token)
    }

    /// Clears the action data of `token`. Missing entries are ignored.
    pub fn consume(&self, token: &str) -> Option<Value> {
        self.store.remove(ACTION_DATA_NAMESPACE, token)
    }

    /// Number of one-shot handlers still waiting.
    pub fn pending_handlers(&self) -> usize {
        self.actions.lock().len()
    }
}

impl std::fmt::Debug for Correlation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlation")
            .field("pending_handlers", &self.pending_handlers())
            .finish_non_exhaustive()
    }
}
