use crate::types::SESSION_KEY_PREFIX;
use std::collections::HashMap;
use std::sync::Mutex;

/// Read access to the host's persisted session fallback store.
///
/// The realtime core has no environment detection; whatever holds the
/// fallback token (browser local storage, a keychain, a config file) is wired
/// in through this trait.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Key under which the fallback session token for a project is stored.
pub fn session_key(project: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{project}")
}

/// In-memory session store. The default when nothing host-backed is wired in,
/// and the double used throughout the tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.into(), value.into());
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok().and_then(|map| map.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_is_prefixed_with_project() {
        assert_eq!(session_key("my-project"), "a_session_my-project");
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("a_session_p1"), None);

        store.insert("a_session_p1", "tok");
        assert_eq!(store.get("a_session_p1"), Some("tok".to_string()));
    }
}
