// Data models for TodoStore

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque task identifier
///
/// New ids are random v4 UUIDs. Ids loaded from storage are kept verbatim,
/// since older records carry ids in other formats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh, random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a new, active task. `text` must already be trimmed and non-empty.
    pub(crate) fn new(text: String, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::generate(),
            text,
            completed: false,
            created_at: now,
            completed_at: None,
            updated_at: None,
        }
    }

    /// Set the completion flag, keeping `completed_at` in step with it
    pub(crate) fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = if completed { Some(now) } else { None };
    }

    pub fn is_active(&self) -> bool {
        !self.completed
    }
}

/// Totals derived from the current list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            counts.total += 1;
            if task.completed {
                counts.completed += 1;
            } else {
                counts.active += 1;
            }
        }
        counts
    }
}

/// Current wall-clock time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
