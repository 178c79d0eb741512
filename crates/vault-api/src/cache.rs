use std::collections::HashMap;
use std::sync::Mutex;

/// Minimal volatile cache for account metadata lookups.
///
/// User, organization and plan records are stable for a process lifetime
/// but sit three chained requests deep, so the client memoizes them here.
/// Nothing is persisted; the cache dies with the session.
#[derive(Debug)]
pub struct Cache<V: Clone> {
    map: Mutex<HashMap<String, V>>,
}

impl<V: Clone> Cache<V> {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        self.map.lock().unwrap().get(key).cloned()
    }

    /// Stores `value` under `key`.
    pub fn set(&self, key: &str, value: V) {
        self.map.lock().unwrap().insert(key.to_string(), value);
    }

    /// Clears the cache.
    pub fn reset(&self) {
        self.map.lock().unwrap().clear();
    }
}

impl<V: Clone> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}
