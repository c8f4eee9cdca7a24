//! Key-value store contract and backend selection.
//!
//! # Architecture
//!
//! The storage system has two layers:
//!
//! 1. **[`KeyValueStore`]** -- the byte-oriented contract every backend
//!    implements (get/set/delete/exists/prefix scan), plus a provided JSON
//!    convenience layer.
//!
//! 2. **[`KvStore`]** -- the concrete store handed to consumers: exactly two
//!    variants, [`InMemoryStore`](memory::InMemoryStore) and
//!    [`RemoteStore`](remote::RemoteStore), selected once at process start
//!    by [`StorageConfig`](crate::config::StorageConfig). Application code
//!    holds one shared `Arc<KvStore>` and never talks to a backend directly.
//!
//! # Best-effort contract
//!
//! No operation raises on ordinary absence or backend unavailability; both
//! degrade to an absent/false result. A lookup during a backend outage is
//! indistinguishable from a key that never existed, which is exactly what
//! makes the store safe to use as a cache everywhere in the system.
//! Failures stay visible through `tracing` output.

pub mod memory;
pub mod remote;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::StorageConfig;

pub use memory::InMemoryStore;
pub use remote::RemoteStore;

/// Byte-oriented key-value store with TTL support.
///
/// All operations are suspend points. Implementations must be `Send + Sync`
/// so one shared instance can serve every concurrent caller.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, or `None` if the key is absent,
    /// expired, or the backend is unreachable.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `value` under `key`, fully replacing any prior value.
    ///
    /// With `ttl` (seconds) the entry becomes unreadable once the TTL
    /// elapses; without, the entry is permanent. Returns `false` when the
    /// write could not be applied.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<u64>) -> bool;

    /// Removes `key`. Deleting an absent key still counts as success.
    async fn delete(&self, key: &str) -> bool;

    /// Reports whether `key` currently holds a live value.
    async fn exists(&self, key: &str) -> bool;

    /// Lists keys matching `pattern`: `*` for all keys, `prefix*` for a
    /// prefix scan, anything else as an exact key. Results are sorted.
    async fn list_keys(&self, pattern: &str) -> Vec<String>;

    /// Releases backend resources. Safe to call more than once.
    async fn close(&self);

    /// Reads and decodes a JSON value stored under `key`.
    ///
    /// A payload that is not valid JSON for `T` reads as absent; the parse
    /// failure is logged so corrupt entries are distinguishable from missing
    /// ones in the logs, if nowhere else.
    async fn get_json<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Send,
    {
        let bytes = self.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(key, %error, "stored payload is not valid JSON, treating as absent");
                None
            }
        }
    }

    /// Encodes `value` as UTF-8 JSON and stores it under `key`.
    ///
    /// Timestamps serialize as ISO 8601 strings and enums as their scalar
    /// tags, so the stored form is readable by any JSON consumer.
    async fn set_json<T>(&self, key: &str, value: &T, ttl: Option<u64>) -> bool
    where
        T: Serialize + Sync,
    {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(key, %error, "failed to encode value as JSON");
                return false;
            }
        };
        self.set(key, &bytes, ttl).await
    }
}

/// The storage backend selected for this process.
///
/// Exactly two variants exist; the choice is made once from configuration
/// and every consumer shares the same instance. The enum dispatches each
/// [`KeyValueStore`] operation to the selected backend.
#[derive(Debug)]
pub enum KvStore {
    /// In-process map with TTL expiry and capacity-bounded eviction.
    Memory(InMemoryStore),
    /// Networked Redis store with retry and reconnection.
    Remote(RemoteStore),
}

impl KvStore {
    /// Selects the backend from configuration: remote when a Redis URL is
    /// configured, in-memory otherwise.
    pub fn from_config(config: &StorageConfig) -> Self {
        match &config.redis_url {
            Some(url) => {
                info!("using redis storage backend");
                Self::Remote(RemoteStore::new(url.clone()))
            }
            None => {
                info!("REDIS_URL not set, using in-memory storage (data is lost on restart)");
                Self::Memory(InMemoryStore::new())
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for KvStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self {
            Self::Memory(store) => store.get(key).await,
            Self::Remote(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<u64>) -> bool {
        match self {
            Self::Memory(store) => store.set(key, value, ttl).await,
            Self::Remote(store) => store.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> bool {
        match self {
            Self::Memory(store) => store.delete(key).await,
            Self::Remote(store) => store.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> bool {
        match self {
            Self::Memory(store) => store.exists(key).await,
            Self::Remote(store) => store.exists(key).await,
        }
    }

    async fn list_keys(&self, pattern: &str) -> Vec<String> {
        match self {
            Self::Memory(store) => store.list_keys(pattern).await,
            Self::Remote(store) => store.list_keys(pattern).await,
        }
    }

    async fn close(&self) {
        match self {
            Self::Memory(store) => store.close().await,
            Self::Remote(store) => store.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_without_url_is_memory() {
        let store = KvStore::from_config(&StorageConfig::default());
        assert!(matches!(store, KvStore::Memory(_)));
    }

    #[test]
    fn selection_with_url_is_remote() {
        let config = StorageConfig {
            redis_url: Some("redis://127.0.0.1:6379".to_string()),
            ..StorageConfig::default()
        };
        let store = KvStore::from_config(&config);
        assert!(matches!(store, KvStore::Remote(_)));
    }

    #[tokio::test]
    async fn enum_dispatch_reaches_memory_backend() {
        let store = KvStore::from_config(&StorageConfig::default());
        assert!(store.set("k", b"v", None).await);
        assert_eq!(store.get("k").await.as_deref(), Some(b"v".as_slice()));
        assert!(store.exists("k").await);
        assert!(store.delete("k").await);
        assert!(!store.exists("k").await);
    }
}
