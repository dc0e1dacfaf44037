// Graveyard: append-only JSONL audit log of abandoned tasks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::state::{Category, Task};

/// One abandoned task and why it was dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraveyardEntry {
    pub ts: DateTime<Utc>,
    pub task_id: String,
    pub text: String,
    pub reason: String,
    /// Rule that selected the task in a batch abandon ("stale", "duplicate", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    pub skip_count: u32,
    pub source: String,
}

impl GraveyardEntry {
    pub fn new(task: &Task, reason: &str, detail: Option<String>, ts: DateTime<Utc>) -> Self {
        Self {
            ts,
            task_id: task.id.clone(),
            text: task.text.clone(),
            reason: reason.to_string(),
            detail,
            category: task.category,
            created_at: task.created_at,
            skip_count: task.skip_count,
            source: task.source.clone(),
        }
    }
}

/// Writes abandoned tasks to a JSONL file next to the state document.
#[derive(Debug, Clone)]
pub struct Graveyard {
    path: PathBuf,
}

impl Graveyard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. An empty reason is refused.
    pub fn bury(&self, entry: &GraveyardEntry) -> io::Result<()> {
        if entry.reason.trim().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "abandoned tasks must carry a reason",
            ));
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(entry).map_err(io::Error::other)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;
        tracing::info!("Abandoned task '{}': {}", entry.text, entry.reason);
        Ok(())
    }

    /// All entries, oldest first. A missing file is an empty graveyard.
    pub fn entries(&self) -> io::Result<Vec<GraveyardEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(&self.path)?
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(io::Error::other))
            .collect()
    }
}
