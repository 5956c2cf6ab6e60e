// JSON encoding of the persisted task list

use crate::models::{Task, TaskId};
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Result of decoding a stored task list
#[derive(Debug, Default)]
pub struct Decoded {
    pub tasks: Vec<Task>,
    /// Elements dropped because they were malformed, empty or duplicated
    pub skipped: usize,
}

/// Serialize the whole list, preserving order
pub fn encode(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("Failed to serialize task list")
}

/// Lenient on-disk shape: anything but `id` and `text` may be missing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    id: String,
    text: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl StoredTask {
    fn into_task(self, loaded_at: DateTime<Utc>) -> Option<Task> {
        let text = self.text.trim();
        if self.id.is_empty() || text.is_empty() {
            return None;
        }

        let created_at = self.created_at.unwrap_or(loaded_at);
        let completed_at = match (self.completed, self.completed_at) {
            (true, Some(ts)) => Some(ts),
            (true, None) => Some(created_at),
            (false, _) => None,
        };

        Some(Task {
            id: TaskId::from(self.id),
            text: text.to_string(),
            completed: self.completed,
            created_at,
            completed_at,
            updated_at: self.updated_at,
        })
    }
}

/// Parse a stored task list
///
/// The top level must be a JSON array. Each element is decoded on its own:
/// malformed records, records with empty text and repeated ids are skipped
/// with a warning so one bad entry never loses the rest of the list.
pub fn decode(raw: &str, loaded_at: DateTime<Utc>) -> Result<Decoded> {
    let values: Vec<Value> = serde_json::from_str(raw).context("Stored task list is not a JSON array")?;

    let mut decoded = Decoded::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, value) in values.into_iter().enumerate() {
        let stored: StoredTask = match serde_json::from_value(value) {
            Ok(s) => s,
            Err(e) => {
                warn!(index, error = ?e, "Failed to parse task record, skipping");
                decoded.skipped += 1;
                continue;
            }
        };

        if seen.contains(&stored.id) {
            warn!(index, id = %stored.id, "Duplicate task id, skipping");
            decoded.skipped += 1;
            continue;
        }

        let id = stored.id.clone();
        match stored.into_task(loaded_at) {
            Some(task) => {
                seen.insert(id);
                decoded.tasks.push(task);
            }
            None => {
                warn!(index, id = %id, "Task record has empty id or text, skipping");
                decoded.skipped += 1;
            }
        }
    }

    debug!(count = decoded.tasks.len(), skipped = decoded.skipped, "Decoded task list");
    Ok(decoded)
}
