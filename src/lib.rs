//! Storage layer for the emoticon generation MCP server.
//!
//! A pluggable key-value cache that transparently falls back between a
//! remote Redis store and an in-process store, layered under a small
//! asynchronous-job state machine that tracks multi-step generation tasks.
//!
//! # Overview
//!
//! Application code obtains one [`KvStore`] at startup -- Redis when
//! `REDIS_URL` is configured, in-memory otherwise -- and shares it with
//! every consumer. [`TaskRegistry`] wraps that instance with typed task
//! operations; [`ArtifactStore`] does the same for preview pages, images,
//! and ZIP downloads. Everything stored carries a per-namespace TTL and
//! every failure mode degrades to an absent result: a lookup during a
//! backend outage looks exactly like a key that expired.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use emoticon_store::{KvStore, StorageConfig, TaskRegistry, TaskStatus};
//!
//! # async fn example() {
//! let config = StorageConfig::from_env();
//! let store = Arc::new(KvStore::from_config(&config));
//! let registry = TaskRegistry::new(Arc::clone(&store), config.ttl.task);
//!
//! let task = registry.create_task("static", 32).await;
//! registry.update_status(&task.task_id, TaskStatus::Running).await;
//! registry.update_progress(&task.task_id, 5, "cat waving").await;
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`store`] -- the [`KeyValueStore`] contract, the in-memory and Redis
//!   backends, and the [`KvStore`] selection enum
//! - [`tasks`] -- the [`GenerationTask`] record, its status state machine,
//!   and the [`TaskRegistry`]
//! - [`artifacts`] -- typed helpers for the preview/image/zip/status
//!   namespaces
//! - [`keys`] -- key namespacing
//! - [`config`] -- environment-driven backend selection and TTLs
//! - [`error`] -- the internal failure taxonomy (logged, never raised)

pub mod artifacts;
pub mod config;
pub mod error;
pub mod keys;
pub mod store;
pub mod tasks;

pub use artifacts::{ArtifactStore, StoredImage};
pub use config::{StorageConfig, TtlConfig};
pub use error::StoreError;
pub use keys::Namespace;
pub use store::memory::InMemoryStore;
pub use store::remote::RemoteStore;
pub use store::{KeyValueStore, KvStore};
pub use tasks::registry::TaskRegistry;
pub use tasks::{GenerationTask, TaskStatus, SCHEMA_VERSION};
