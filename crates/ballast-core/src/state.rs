//! Per-service state store — one concurrency-safe container for everything.
//!
//! Every service shares this single store type; the loop worker and external
//! readers (registry introspection, command layers) only ever touch it
//! through these accessors. Snapshots are detached copies, never live
//! references into the map.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Clonable handle to a service's key/value state. Clones share the map.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value. A non-serializable value is dropped
    /// with a warning rather than poisoning the caller.
    pub fn update(&self, key: &str, value: impl serde::Serialize) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("State value for '{}' is not serializable: {}", key, e);
                return;
            }
        };
        self.write().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Detached copy of the whole map.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.read().clone()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Bump an integer counter, returning the new value. Missing or
    /// non-integer entries restart from zero.
    pub fn increment(&self, key: &str) -> i64 {
        let mut map = self.write();
        let next = map.get(key).and_then(Value::as_i64).unwrap_or(0) + 1;
        map.insert(key.to_string(), Value::from(next));
        next
    }

    // A poisoned lock only means a writer panicked mid-update; the map
    // itself is still usable, so recover instead of propagating the panic.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
