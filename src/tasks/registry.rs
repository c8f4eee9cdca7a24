//! Typed task operations over the key-value store.
//!
//! [`TaskRegistry`] is the only writer of the `task:` namespace. Every
//! mutation is a full read-modify-write: load the record, change the
//! in-memory copy, stamp `updated_at`, write the whole blob back with a
//! refreshed TTL (sliding expiration). Two concurrent mutations of the same
//! task race and the later write wins; acceptable while each task has a
//! single writer, a real hazard under any other access pattern.
//!
//! Operations on an absent id -- expired, evicted, or never created -- are
//! silent no-ops returning `None`. No error is raised and no task springs
//! into existence, consistent with the store's best-effort contract.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::keys::Namespace;
use crate::store::{KeyValueStore, KvStore};
use crate::tasks::{GenerationTask, TaskStatus};

/// Registry of generation tasks, generic over the backing store.
///
/// Constructed once at process start with the shared store handle and the
/// task TTL, then injected into every consumer.
#[derive(Debug, Clone)]
pub struct TaskRegistry<S = KvStore> {
    store: Arc<S>,
    ttl_seconds: u64,
}

impl<S: KeyValueStore> TaskRegistry<S> {
    /// Creates a registry persisting tasks through `store` with the given
    /// sliding TTL in seconds.
    pub fn new(store: Arc<S>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    /// Writes the record back under its key with a fresh TTL.
    async fn save(&self, task: &GenerationTask) -> bool {
        let key = Namespace::Task.key(&task.task_id);
        let saved = self
            .store
            .set_json(&key, task, Some(self.ttl_seconds))
            .await;
        if !saved {
            warn!(task_id = %task.task_id, "failed to persist task record");
        }
        saved
    }

    /// Loads, mutates, stamps, and writes back; `None` when the id is
    /// absent.
    async fn mutate<F>(&self, task_id: &str, apply: F) -> Option<GenerationTask>
    where
        F: FnOnce(&mut GenerationTask) + Send,
    {
        let mut task = self.get_task(task_id).await?;
        apply(&mut task);
        task.touch();
        self.save(&task).await;
        Some(task)
    }

    /// Creates and persists a new `Pending` task, returning it.
    ///
    /// The returned record is valid even if the initial write was dropped
    /// by a degraded backend; later operations on it are then no-ops.
    pub async fn create_task(&self, emoticon_type: &str, total_count: u32) -> GenerationTask {
        let task = GenerationTask::new(emoticon_type, total_count);
        self.save(&task).await;
        debug!(
            task_id = %task.task_id,
            emoticon_type,
            total_count,
            "created generation task"
        );
        task
    }

    /// Reads a task by id; `None` when the key is gone (expired, evicted,
    /// never existed, or the backend is unreachable).
    pub async fn get_task(&self, task_id: &str) -> Option<GenerationTask> {
        self.store.get_json(&Namespace::Task.key(task_id)).await
    }

    /// Overwrites the task's status.
    pub async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Option<GenerationTask> {
        self.mutate(task_id, |task| {
            if task.status.is_terminal() && task.status != status {
                warn!(
                    task_id = %task.task_id,
                    from = %task.status,
                    to = %status,
                    "overwriting terminal task status"
                );
            }
            task.status = status;
        })
        .await
    }

    /// Records progress as reported by the generation loop.
    ///
    /// `completed_count` is clamped to `total_count`. It is independent of
    /// the emoticon list length: appending an item does not advance the
    /// count, and the count can be advanced without appending.
    pub async fn update_progress(
        &self,
        task_id: &str,
        completed_count: u32,
        current_description: &str,
    ) -> Option<GenerationTask> {
        self.mutate(task_id, |task| {
            task.completed_count = completed_count.min(task.total_count);
            task.current_description = current_description.to_string();
        })
        .await
    }

    /// Appends a produced-item descriptor.
    pub async fn add_emoticon(&self, task_id: &str, emoticon: Value) -> Option<GenerationTask> {
        self.mutate(task_id, |task| {
            task.emoticons.push(emoticon);
        })
        .await
    }

    /// Sets the set-icon descriptor.
    pub async fn set_icon(&self, task_id: &str, icon: Value) -> Option<GenerationTask> {
        self.mutate(task_id, |task| {
            task.icon = Some(icon);
        })
        .await
    }

    /// Forces the task into `Failed` with the given message, regardless of
    /// its prior state.
    pub async fn set_error(&self, task_id: &str, message: &str) -> Option<GenerationTask> {
        self.mutate(task_id, |task| {
            task.status = TaskStatus::Failed;
            task.error_message = Some(message.to_string());
        })
        .await
    }

    /// Forces the task into `Completed`.
    ///
    /// Does not check `completed_count` against `total_count`; the caller
    /// decides when the job is done.
    pub async fn complete(&self, task_id: &str) -> Option<GenerationTask> {
        self.mutate(task_id, |task| {
            task.status = TaskStatus::Completed;
        })
        .await
    }
}
