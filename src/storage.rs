//! Durable local key-value storage.
//!
//! The read-state reconciler writes its overlay and write-ahead buffer here
//! before attempting any remote call, so forced-read state survives process
//! restarts. Keys are namespaced strings, values JSON.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

/// Synchronous local store. Implementations must persist across restarts in
/// production; the in-memory variant below backs tests.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn remove(&self, key: &str);
}

/// Process-local store, survives only as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().expect("local store lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries
            .write()
            .expect("local store lock")
            .insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.write().expect("local store lock").remove(key);
    }
}
