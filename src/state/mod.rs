// Persisted scheduling state
//
// One JSON document holds everything the agent knows between wake-ups:
// tracked artifacts, the task queue, the active task, session history and
// the completed-signature set. The store owns the document; every other
// component works on a loaded copy and writes back through the store.

mod artifact;
mod error;
mod store;
mod task;

pub use artifact::{ArtifactType, TrackedArtifact};
pub use error::StoreError;
pub use store::{JsonFileStore, StateStore};
pub use task::{
    infer_category, signature_of, Category, Impact, Task, DEFAULT_PRIORITY, FALLBACK_CATEGORY,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How a task left the active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Completed,
    Abandoned,
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutcome::Completed => f.write_str("completed"),
            TaskOutcome::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// Append-only record of one finished session task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistoryEntry {
    pub date: DateTime<Utc>,
    pub category: Category,
    pub task_name: String,
    pub outcome: TaskOutcome,
    /// Identity of the task, used to make recording idempotent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl SessionHistoryEntry {
    pub fn for_task(task: &Task, outcome: TaskOutcome, date: DateTime<Utc>) -> Self {
        Self {
            date,
            category: task.category,
            task_name: task.text.clone(),
            outcome,
            task_id: Some(task.id.clone()),
        }
    }
}

/// Snapshot of the most recent session, for the next wake-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSession {
    pub date: DateTime<Utc>,
    pub focus: String,
    pub outcome: TaskOutcome,
}

/// Tunables persisted with the document itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateConfig {
    #[serde(default = "default_max_boot_files")]
    pub max_boot_files: usize,
    #[serde(default = "default_weight_decay_per_day")]
    pub weight_decay_per_day: f64,
    /// Hard floor for core artifacts; strictly above `min_weight`.
    #[serde(default = "default_min_core_weight")]
    pub min_core_weight: f64,
    /// Floor for every other artifact type.
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,
}

fn default_max_boot_files() -> usize {
    10
}

fn default_weight_decay_per_day() -> f64 {
    0.01
}

fn default_min_core_weight() -> f64 {
    0.5
}

fn default_min_weight() -> f64 {
    0.05
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_boot_files: default_max_boot_files(),
            weight_decay_per_day: default_weight_decay_per_day(),
            min_core_weight: default_min_core_weight(),
            min_weight: default_min_weight(),
        }
    }
}

impl StateConfig {
    /// Decay floor for an artifact of the given type.
    pub fn floor_for(&self, kind: ArtifactType) -> f64 {
        if kind.is_core() {
            self.min_core_weight
        } else {
            self.min_weight
        }
    }
}

/// The aggregate root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestState {
    /// Bumped on every save; a save from an older revision is a conflict.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub artifacts: BTreeMap<String, TrackedArtifact>,
    #[serde(default)]
    pub task_queue: Vec<Task>,
    #[serde(default)]
    pub active_task: Option<Task>,
    #[serde(default)]
    pub session_history: Vec<SessionHistoryEntry>,
    #[serde(default)]
    pub completed_signatures: BTreeSet<String>,
    #[serde(default)]
    pub recent_topics: Vec<String>,
    #[serde(default)]
    pub last_session: Option<LastSession>,
    #[serde(default)]
    pub last_decay_run: Option<NaiveDate>,
    #[serde(default)]
    pub config: StateConfig,
}

impl ManifestState {
    pub fn new(config: StateConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Whether a completion for this task id is already in history.
    pub fn has_recorded(&self, task_id: &str, outcome: TaskOutcome) -> bool {
        self.session_history
            .iter()
            .any(|e| e.outcome == outcome && e.task_id.as_deref() == Some(task_id))
    }

    pub fn is_active(&self, task_id: &str) -> bool {
        self.active_task.as_ref().is_some_and(|t| t.id == task_id)
    }
}
