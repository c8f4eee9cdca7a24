//! In-process storage backend.
//!
//! [`InMemoryStore`] is the fallback used when no remote endpoint is
//! configured. One async mutex guards the whole map, making every operation
//! a single critical section; callers are not hot-path, so simplicity wins
//! over lock granularity here.
//!
//! Expiry is enforced at two points: reads check the expiry instant of the
//! key they touch, and every write (and key listing) purges all expired
//! entries first. Capacity pressure is handled by evicting the
//! earliest-expiring entries; entries without a TTL are never eviction
//! candidates, so a permanent entry can only disappear via `delete`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::KeyValueStore;

/// Default cap on the number of stored entries.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct State {
    data: HashMap<String, Vec<u8>>,
    expiry: HashMap<String, DateTime<Utc>>,
}

impl State {
    /// Drops every entry whose expiry instant has passed.
    fn purge_expired(&mut self) {
        let now = Utc::now();
        let expired: Vec<String> = self
            .expiry
            .iter()
            .filter(|(_, expires_at)| **expires_at < now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.data.remove(key);
            self.expiry.remove(key);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "purged expired entries");
        }
    }

    /// Returns `true` (and removes the entry) when `key` has expired.
    fn expire_if_due(&mut self, key: &str) -> bool {
        let due = self
            .expiry
            .get(key)
            .is_some_and(|expires_at| *expires_at < Utc::now());
        if due {
            self.data.remove(key);
            self.expiry.remove(key);
        }
        due
    }

    /// Makes room for one more entry when the store is at its cap.
    ///
    /// Evicts the earliest-expiring entries until the size falls to half the
    /// cap. Only entries carrying a TTL are candidates; with enough
    /// permanent entries the store can stay above the target, but every
    /// production namespace writes with a TTL.
    fn evict_for_insert(&mut self, capacity: usize) {
        if self.data.len() < capacity {
            return;
        }
        let mut candidates: Vec<(String, DateTime<Utc>)> = self
            .expiry
            .iter()
            .map(|(key, expires_at)| (key.clone(), *expires_at))
            .collect();
        candidates.sort_by_key(|(_, expires_at)| *expires_at);

        let target = capacity / 2;
        let excess = self.data.len().saturating_sub(target);
        let mut evicted = 0usize;
        for (key, _) in candidates.into_iter().take(excess) {
            self.data.remove(&key);
            self.expiry.remove(&key);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, remaining = self.data.len(), "evicted entries for capacity");
        }
    }
}

/// Concurrency-safe in-process key-value store with TTL expiry.
///
/// Data does not survive a restart; the store exists so the system keeps
/// working without a Redis endpoint.
#[derive(Debug)]
pub struct InMemoryStore {
    state: Mutex<State>,
    capacity: usize,
}

impl InMemoryStore {
    /// Creates a store with the default capacity cap.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a store capped at `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capacity,
        }
    }

    /// Number of entries currently stored, including not-yet-purged expired
    /// ones.
    pub async fn len(&self) -> usize {
        self.state.lock().await.data.len()
    }

    /// Reports whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.data.is_empty()
    }

    /// Rewrites `key`'s expiry to the past so the next access sees it as
    /// expired.
    #[cfg(test)]
    pub(crate) async fn force_expire(&self, key: &str) {
        let mut state = self.state.lock().await;
        state
            .expiry
            .insert(key.to_string(), Utc::now() - Duration::seconds(1));
    }

    /// The absolute expiry instant recorded for `key`, if any.
    #[cfg(test)]
    pub(crate) async fn expiry_of(&self, key: &str) -> Option<DateTime<Utc>> {
        self.state.lock().await.expiry.get(key).copied()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock().await;
        if state.expire_if_due(key) {
            return None;
        }
        state.data.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<u64>) -> bool {
        let mut state = self.state.lock().await;
        state.purge_expired();
        state.evict_for_insert(self.capacity);

        state.data.insert(key.to_string(), value.to_vec());
        match ttl {
            Some(seconds) => {
                let expires_at = Utc::now() + Duration::seconds(seconds as i64);
                state.expiry.insert(key.to_string(), expires_at);
            }
            None => {
                // Overwriting with no TTL makes the entry permanent.
                state.expiry.remove(key);
            }
        }
        true
    }

    async fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        state.data.remove(key);
        state.expiry.remove(key);
        true
    }

    async fn exists(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.expire_if_due(key) {
            return false;
        }
        state.data.contains_key(key)
    }

    async fn list_keys(&self, pattern: &str) -> Vec<String> {
        let mut state = self.state.lock().await;
        state.purge_expired();

        let mut keys: Vec<String> = if pattern == "*" {
            state.data.keys().cloned().collect()
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            state
                .data
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect()
        } else {
            state
                .data
                .keys()
                .filter(|key| key.as_str() == pattern)
                .cloned()
                .collect()
        };
        keys.sort();
        keys
    }

    async fn close(&self) {
        // Nothing to release.
    }
}
