//! Ephemeral key-value store.
//!
//! Holds correlation state (action data, stored bags, rule counters) for the
//! lifetime of the process. Entries are namespaced; nothing expires.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Namespaced JSON storage.
///
/// `modify` runs the closure under the store's lock so read-modify-write
/// sequences such as rule counters are atomic.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns a copy of the value at `namespace/key`.
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;

    /// Stores `value`, returning the previous one.
    fn set(&self, namespace: &str, key: &str, value: Value) -> Option<Value>;

    /// Removes and returns the value.
    fn remove(&self, namespace: &str, key: &str) -> Option<Value>;

    /// Atomically updates the entry. Setting the slot to `None` removes it.
    fn modify(&self, namespace: &str, key: &str, f: &mut dyn FnMut(&mut Option<Value>));

    /// Number of entries in `namespace`.
    fn len(&self, namespace: &str) -> usize;
}

/// A shared store handle.
pub type BoxedStore = Arc<dyn KeyValueStore>;

/// In-memory [`KeyValueStore`] behind one global mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store behind an `Arc`.
    pub fn shared() -> BoxedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.inner.lock().get(namespace)?.get(key).cloned()
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> Option<Value> {
        self.inner
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value)
    }

    fn remove(&self, namespace: &str, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let bucket = inner.get_mut(namespace)?;
        let removed = bucket.remove(key);
        if bucket.is_empty() {
            inner.remove(namespace);
        }
        removed
    }

    fn modify(&self, namespace: &str, key: &str, f: &mut dyn FnMut(&mut Option<Value>)) {
        let mut inner = self.inner.lock();
        let bucket = inner.entry(namespace.to_string()).or_default();
        let mut slot = bucket.remove(key);
        f(&mut slot);
        if let Some(value) = slot {
            bucket.insert(key.to_string(), value);
        }
        if bucket.is_empty() {
            inner.remove(namespace);
        }
    }

    fn len(&self, namespace: &str) -> usize {
        self.inner.lock().get(namespace).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn namespaces_are_isolated() {
        let store = MemoryStore::new();
        store.set("a", "k", json!(1));
        store.set("b", "k", json!(2));
        assert_eq!(store.get("a", "k"), Some(json!(1)));
        assert_eq!(store.remove("b", "k"), Some(json!(2)));
        assert_eq!(store.get("b", "k"), None);
        assert_eq!(store.len("a"), 1);
        assert_eq!(store.len("b"), 0);
    }

    #[test]
    fn modify_is_read_modify_write() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            store.modify("count", "u", &mut |slot| {
                let next = slot.as_ref().and_then(Value::as_u64).unwrap_or(0) + 1;
                *slot = Some(json!(next));
            });
        }
        assert_eq!(store.get("count", "u"), Some(json!(3)));

        store.modify("count", "u", &mut |slot| *slot = None);
        assert_eq!(store.get("count", "u"), None);
    }

    #[test]
    fn removing_missing_entries_is_tolerated() {
        let store = MemoryStore::new();
        assert_eq!(store.remove("x", "y"), None);
    }
}
