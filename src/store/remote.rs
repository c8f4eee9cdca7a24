//! Redis storage backend.
//!
//! [`RemoteStore`] maps the [`KeyValueStore`] contract onto the server's
//! native primitives: `GET`, `SET`/`SETEX`, `DEL`, `EXISTS`, and `KEYS`.
//! Writes with a TTL use `SETEX` so there is never a window where an
//! unexpiring copy is visible.
//!
//! # Connection model
//!
//! One [`MultiplexedConnection`] serves all concurrent callers. It is
//! created lazily, at most once, under an async mutex; clones share the
//! underlying TCP stream. There is no health check: a consecutive-failure
//! counter tears the handle down after persistent errors so the next
//! attempt reconnects fresh.
//!
//! # Retry
//!
//! Every command runs through [`with_retries`]: up to [`RETRY_ATTEMPTS`]
//! attempts with a linear `0.5s x attempt` backoff between them. When the
//! budget is exhausted the failure is logged and the operation degrades to
//! the store's absent/false result, per the best-effort contract.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;

use super::KeyValueStore;

/// Total attempts per operation, including the first.
pub(crate) const RETRY_ATTEMPTS: u32 = 3;

/// Base backoff step; attempt `n` waits `n` times this before retrying.
pub(crate) const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Consecutive failures tolerated before the connection handle is torn down.
const RECONNECT_THRESHOLD: u32 = 5;

/// Budget for establishing the server connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for a single command round-trip.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Counts consecutive operation failures and signals when the shared
/// connection should be discarded.
///
/// The counter resets on every success and whenever it trips the threshold,
/// so each teardown requires a fresh run of failures.
#[derive(Debug)]
pub(crate) struct FailureTracker {
    consecutive: AtomicU32,
    threshold: u32,
}

impl FailureTracker {
    pub(crate) fn new(threshold: u32) -> Self {
        Self {
            consecutive: AtomicU32::new(0),
            threshold,
        }
    }

    /// Records one failure; returns `true` when the caller should tear the
    /// connection down.
    pub(crate) fn record_failure(&self) -> bool {
        let count = self.consecutive.fetch_add(1, Ordering::Relaxed) + 1;
        if count > self.threshold {
            self.consecutive.store(0, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Clears the failure run after a success or a reconnect.
    pub(crate) fn reset(&self) {
        self.consecutive.store(0, Ordering::Relaxed);
    }
}

/// Runs `attempt_fn` up to [`RETRY_ATTEMPTS`] times with linear backoff
/// between attempts (none after the last). The closure receives the
/// 1-based attempt number.
pub(crate) async fn with_retries<T, F, Fut>(mut attempt_fn: F) -> Result<T, StoreError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= RETRY_ATTEMPTS => return Err(error),
            Err(error) => {
                debug!(attempt, %error, "operation failed, backing off before retry");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
        }
    }
}

/// Key-value store backed by a Redis server.
#[derive(Debug)]
pub struct RemoteStore {
    url: String,
    conn: Mutex<Option<MultiplexedConnection>>,
    failures: FailureTracker,
    connections_opened: AtomicU64,
}

impl RemoteStore {
    /// Creates a store for the given `redis://` URL.
    ///
    /// No connection is made here; the first operation connects lazily, so
    /// construction never fails and an unreachable server only shows up as
    /// absent results later.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conn: Mutex::new(None),
            failures: FailureTracker::new(RECONNECT_THRESHOLD),
            connections_opened: AtomicU64::new(0),
        }
    }

    /// How many times a server connection has been established over the
    /// store's lifetime. Increments on the initial connect and after every
    /// failure-triggered reconnect.
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    /// Returns the shared connection, establishing it if needed.
    ///
    /// The mutex is held across the connect so concurrent callers cannot
    /// race to create duplicate connections.
    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let client = redis::Client::open(self.url.as_str()).map_err(StoreError::Connection)?;
        let conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StoreError::Timeout {
            op: "CONNECT",
            after: CONNECT_TIMEOUT,
        })?
        .map_err(StoreError::Connection)?;

        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.failures.reset();
        info!("established redis connection");

        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Discards the shared connection so the next operation reconnects.
    async fn drop_connection(&self) {
        let mut guard = self.conn.lock().await;
        if guard.take().is_some() {
            warn!("discarding redis connection after repeated failures");
        }
    }

    /// Runs one command through the retry wrapper.
    ///
    /// `command` is invoked once per attempt with a clone of the shared
    /// connection and must produce an owned future (clone keys/values in,
    /// before the `async move` block).
    async fn execute<T, F, Fut>(&self, op: &'static str, command: F) -> Result<T, StoreError>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let command = &command;
        with_retries(|_attempt| async move {
            let outcome = match self.connection().await {
                Ok(conn) => match tokio::time::timeout(COMMAND_TIMEOUT, command(conn)).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(error)) => Err(StoreError::Command(error)),
                    Err(_) => Err(StoreError::Timeout {
                        op,
                        after: COMMAND_TIMEOUT,
                    }),
                },
                Err(error) => Err(error),
            };
            match &outcome {
                Ok(_) => self.failures.reset(),
                Err(_) => {
                    if self.failures.record_failure() {
                        self.drop_connection().await;
                    }
                }
            }
            outcome
        })
        .await
    }
}

#[async_trait]
impl KeyValueStore for RemoteStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let result = self
            .execute("GET", |mut conn| {
                let key = key.to_owned();
                async move { conn.get::<_, Option<Vec<u8>>>(&key).await }
            })
            .await;
        match result {
            Ok(value) => value,
            Err(error) => {
                warn!(key, %error, "redis GET failed after retries");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<u64>) -> bool {
        let result = self
            .execute("SET", |mut conn| {
                let key = key.to_owned();
                let value = value.to_vec();
                async move {
                    match ttl {
                        // Store-with-expiration in one command; a plain SET
                        // followed by EXPIRE would briefly expose an
                        // unexpiring copy.
                        Some(seconds) => conn.set_ex::<_, _, ()>(&key, value, seconds).await,
                        None => conn.set::<_, _, ()>(&key, value).await,
                    }
                }
            })
            .await;
        match result {
            Ok(()) => true,
            Err(error) => {
                warn!(key, %error, "redis SET failed after retries");
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let result = self
            .execute("DEL", |mut conn| {
                let key = key.to_owned();
                async move { conn.del::<_, i64>(&key).await }
            })
            .await;
        match result {
            Ok(_removed) => true,
            Err(error) => {
                warn!(key, %error, "redis DEL failed after retries");
                false
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let result = self
            .execute("EXISTS", |mut conn| {
                let key = key.to_owned();
                async move { conn.exists::<_, bool>(&key).await }
            })
            .await;
        match result {
            Ok(found) => found,
            Err(error) => {
                warn!(key, %error, "redis EXISTS failed after retries");
                false
            }
        }
    }

    async fn list_keys(&self, pattern: &str) -> Vec<String> {
        let result = self
            .execute("KEYS", |mut conn| {
                let pattern = pattern.to_owned();
                async move { conn.keys::<_, Vec<String>>(&pattern).await }
            })
            .await;
        match result {
            Ok(mut keys) => {
                keys.sort();
                keys
            }
            Err(error) => {
                warn!(pattern, %error, "redis KEYS failed after retries");
                Vec::new()
            }
        }
    }

    async fn close(&self) {
        // Dropping the multiplexed handle closes the underlying stream;
        // there is nothing that can fail here.
        let mut guard = self.conn.lock().await;
        guard.take();
    }
}


/// Integration tests against a real Redis instance.
///
/// Requires a running server (default `redis://127.0.0.1:6379`; override
/// with `REDIS_URL`). Each test isolates its keys under a UUID prefix.
///
/// Run with:
/// ```bash
/// cargo test --features redis-tests -- redis_ --test-threads=1
/// ```
#[cfg(all(test, feature = "redis-tests"))]
mod integration_tests {
    use super::*;

    fn test_store() -> (RemoteStore, String) {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let prefix = format!("test-{}", uuid::Uuid::new_v4());
        (RemoteStore::new(url), prefix)
    }

    #[tokio::test]
    async fn redis_set_get_delete_round_trip() {
        let (store, prefix) = test_store();
        let key = format!("{prefix}:k1");

        assert!(store.set(&key, b"hello", None).await);
        assert_eq!(store.get(&key).await.as_deref(), Some(b"hello".as_slice()));
        assert!(store.exists(&key).await);

        assert!(store.delete(&key).await);
        assert_eq!(store.get(&key).await, None);
        assert!(!store.exists(&key).await);
    }

    #[tokio::test]
    async fn redis_set_with_ttl_expires() {
        let (store, prefix) = test_store();
        let key = format!("{prefix}:ttl");

        assert!(store.set(&key, b"soon gone", Some(1)).await);
        assert!(store.exists(&key).await);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(store.get(&key).await, None);
    }

    #[tokio::test]
    async fn redis_list_keys_scopes_by_prefix() {
        let (store, prefix) = test_store();
        store.set(&format!("{prefix}:a"), b"1", Some(60)).await;
        store.set(&format!("{prefix}:b"), b"2", Some(60)).await;

        let keys = store.list_keys(&format!("{prefix}:*")).await;
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with(&prefix)));

        store.delete(&format!("{prefix}:a")).await;
        store.delete(&format!("{prefix}:b")).await;
    }

    #[tokio::test]
    async fn redis_reconnects_with_a_fresh_handle() {
        let (store, prefix) = test_store();
        let key = format!("{prefix}:reconnect");

        store.set(&key, b"v", Some(60)).await;
        assert_eq!(store.connections_opened(), 1);

        // Simulate the teardown that repeated failures trigger.
        store.drop_connection().await;

        assert_eq!(store.get(&key).await.as_deref(), Some(b"v".as_slice()));
        assert_eq!(store.connections_opened(), 2);

        store.delete(&key).await;
    }
}
