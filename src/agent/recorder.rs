// Session recorder: appends history entries straight to the state store
//
// History is append-only. Recording goes through the store on its own, so
// any caller holding a loaded copy must reload before saving again.

use crate::state::{Category, SessionHistoryEntry, StateStore, StoreError};

pub struct SessionRecorder<'a, S: StateStore> {
    store: &'a S,
}

impl<'a, S: StateStore> SessionRecorder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Append `entry`. Returns `false` when an entry with the same task id
    /// and outcome is already recorded, so retries never double-count.
    pub fn record(&self, entry: &SessionHistoryEntry) -> Result<bool, StoreError> {
        let appended = self.store.update(|state| {
            let duplicate = entry
                .task_id
                .as_deref()
                .is_some_and(|id| state.has_recorded(id, entry.outcome));
            if duplicate {
                return false;
            }
            state.session_history.push(entry.clone());
            true
        })?;

        if appended {
            tracing::info!("Recorded {} task: {}", entry.outcome, entry.task_name);
        } else {
            tracing::debug!("History already holds {} task: {}", entry.outcome, entry.task_name);
        }
        Ok(appended)
    }
}

/// The run of identical categories at the end of history, if any.
pub fn current_streak(history: &[SessionHistoryEntry]) -> Option<(Category, usize)> {
    let last = history.last()?.category;
    let len = history
        .iter()
        .rev()
        .take_while(|e| e.category == last)
        .count();
    Some((last, len))
}
