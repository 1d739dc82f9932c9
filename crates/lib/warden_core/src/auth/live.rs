//! Live-token cache: the last session token issued per username.
//!
//! This is a node-local hint, not a revocation list. A token removed from
//! here stays cryptographically valid until it expires.

use dashmap::DashMap;

/// Store of the last-issued token per subject.
pub trait LiveTokenStore: Send + Sync {
    /// Record `token` as the live token for `subject`, replacing any prior one.
    fn put(&self, subject: &str, token: &str);

    /// Current live token for `subject`.
    fn get(&self, subject: &str) -> Option<String>;

    /// Drop the entry for `subject`, returning what was there.
    fn remove(&self, subject: &str) -> Option<String>;

    /// Drop every entry.
    fn clear(&self);
}

/// Process-local [`LiveTokenStore`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryLiveTokenStore {
    entries: DashMap<String, String>,
}

impl InMemoryLiveTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LiveTokenStore for InMemoryLiveTokenStore {
    fn put(&self, subject: &str, token: &str) {
        self.entries.insert(subject.to_string(), token.to_string());
    }

    fn get(&self, subject: &str) -> Option<String> {
        self.entries.get(subject).map(|entry| entry.value().clone())
    }

    fn remove(&self, subject: &str) -> Option<String> {
        self.entries.remove(subject).map(|(_, token)| token)
    }

    fn clear(&self) {
        self.entries.clear();
    }
}
