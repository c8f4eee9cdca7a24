//! Generation task domain types.
//!
//! A [`GenerationTask`] tracks one multi-step emoticon generation job. The
//! record is persisted as a JSON blob under `task:<id>` and reconstructed
//! from storage on every read; no in-memory identity is shared across
//! calls. Mutation happens exclusively through
//! [`TaskRegistry`](registry::TaskRegistry).

pub mod registry;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Version tag written into every persisted task record.
///
/// Bump when the stored shape changes; readers use the tag to apply
/// migrations instead of guessing from field presence.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Task lifecycle status.
///
/// ```text
/// Pending -> Running -> Completed
///                    -> Failed
/// ```
///
/// `Completed` and `Failed` are terminal. The registry does not reject
/// writes out of a terminal state -- `set_error` must be able to force
/// `Failed` from anywhere -- but it logs when one is overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up.
    Pending,
    /// Generation in progress.
    Running,
    /// Finished successfully (terminal).
    Completed,
    /// Gave up with an error (terminal).
    Failed,
}

impl TaskStatus {
    /// Returns `true` for the states no transition leads out of.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One tracked emoticon generation job.
///
/// Serializes with snake_case field names, RFC 3339 timestamps, and the
/// status as its scalar tag, matching what every JSON consumer of the
/// `task:` namespace expects. Produced-item descriptors stay opaque JSON:
/// their shape belongs to the image pipeline, not the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    /// Persisted-shape version, for future migrations.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Opaque unique id; immutable after creation.
    pub task_id: String,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Which kind of emoticon set is being generated.
    pub emoticon_type: String,

    /// Number of items this job will produce; fixed at creation.
    pub total_count: u32,

    /// Items finished so far, as reported by the generation loop.
    #[serde(default)]
    pub completed_count: u32,

    /// Free-text description of the item currently being generated.
    #[serde(default)]
    pub current_description: String,

    /// Descriptors of produced items, append-only.
    #[serde(default)]
    pub emoticons: Vec<Value>,

    /// Descriptor of the set icon, once generated.
    #[serde(default)]
    pub icon: Option<Value>,

    /// Failure detail; set when the job fails.
    #[serde(default)]
    pub error_message: Option<String>,

    /// Creation instant; immutable.
    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
}

impl GenerationTask {
    /// Creates a fresh `Pending` task with zero progress.
    pub fn new(emoticon_type: impl Into<String>, total_count: u32) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION,
            task_id: Uuid::new_v4().to_string(),
            status: TaskStatus::Pending,
            emoticon_type: emoticon_type.into(),
            total_count,
            completed_count: 0,
            current_description: String::new(),
            emoticons: Vec::new(),
            icon: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Completion percentage, rounded to the nearest integer; 0 when the
    /// job has no items.
    pub fn progress_percent(&self) -> u32 {
        if self.total_count == 0 {
            return 0;
        }
        (f64::from(self.completed_count) / f64::from(self.total_count) * 100.0).round() as u32
    }

    /// Stamps the record as just-modified.
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn status_serializes_as_snake_case_tag() {
        assert_eq!(serde_json::to_value(TaskStatus::Pending).unwrap(), "pending");
        assert_eq!(serde_json::to_value(TaskStatus::Running).unwrap(), "running");
        assert_eq!(
            serde_json::to_value(TaskStatus::Completed).unwrap(),
            "completed"
        );
        assert_eq!(serde_json::to_value(TaskStatus::Failed).unwrap(), "failed");
    }

    #[test]
    fn status_display_matches_serde_tag() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            let tag = serde_json::to_value(status).unwrap();
            assert_eq!(tag, status.to_string());
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn new_task_starts_pending_with_zero_progress() {
        let task = GenerationTask::new("static", 32);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.total_count, 32);
        assert_eq!(task.completed_count, 0);
        assert_eq!(task.progress_percent(), 0);
        assert!(task.emoticons.is_empty());
        assert!(task.icon.is_none());
        assert!(task.error_message.is_none());
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(task.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn task_ids_are_unique() {
        let a = GenerationTask::new("static", 1);
        let b = GenerationTask::new("static", 1);
        assert_ne!(a.task_id, b.task_id);
        assert!(Uuid::parse_str(&a.task_id).is_ok());
    }

    #[test]
    fn progress_rounds_to_nearest_percent() {
        let mut task = GenerationTask::new("static", 32);
        task.completed_count = 5;
        // 5/32 = 15.625% -> 16
        assert_eq!(task.progress_percent(), 16);

        task.completed_count = 32;
        assert_eq!(task.progress_percent(), 100);

        let empty = GenerationTask::new("static", 0);
        assert_eq!(empty.progress_percent(), 0);
    }

    #[test]
    fn serde_round_trip_reproduces_every_field() {
        let mut task = GenerationTask::new("animated", 8);
        task.status = TaskStatus::Running;
        task.completed_count = 3;
        task.current_description = "cat waving".to_string();
        task.emoticons.push(json!({
            "description": "cat waving",
            "image_url": "/image/abc123",
        }));
        task.icon = Some(json!({"image_url": "/image/icon1"}));

        let encoded = serde_json::to_string(&task).unwrap();
        let decoded: GenerationTask = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, task);
    }

    #[test]
    fn persisted_json_uses_scalar_tags_and_iso_timestamps() {
        let task = GenerationTask::new("static", 4);
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["status"], "pending");
        assert_eq!(value["schema_version"], 1);
        // RFC 3339 timestamps are what non-Rust consumers parse.
        let created_at = value["created_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
        // Optional fields are present as null, not omitted.
        assert!(value["icon"].is_null());
        assert!(value["error_message"].is_null());
    }

    #[test]
    fn records_without_version_tag_read_as_version_1() {
        // Blobs written before the version tag existed.
        let legacy = json!({
            "task_id": "abc123",
            "status": "running",
            "emoticon_type": "static",
            "total_count": 16,
            "completed_count": 4,
            "current_description": "",
            "emoticons": [],
            "icon": null,
            "error_message": null,
            "created_at": "2026-08-01T09:00:00Z",
            "updated_at": "2026-08-01T09:05:00Z",
        });
        let task: GenerationTask = serde_json::from_value(legacy).unwrap();
        assert_eq!(task.schema_version, 1);
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.completed_count, 4);
    }
}
