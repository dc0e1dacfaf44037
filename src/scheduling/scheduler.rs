// Scheduler state machine
//
// Queued -> Active (singleton) -> Completed | Abandoned
//
// Every mutation follows the same discipline: load a fresh copy, mutate it,
// save through the store, reload and retry if another writer got in first.
// Completion is the one exception: history is appended through the session
// recorder before anything else, and the rest of the transition is applied
// to a copy reloaded after that append.

use chrono::{DateTime, Utc};
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::queue::{pick_next, rank, select_stale, Ranking, StaleKind};
use super::scorer::{Exclusion, ScoreBreakdown, ScoringContext, TaskScorer};
use crate::agent::{GenerationRule, Graveyard, GraveyardEntry, SessionRecorder, TaskGenerator};
use crate::config::constants::GRAVEYARD_FILE_NAME;
use crate::config::{AbandonSettings, Settings};
use crate::state::{
    JsonFileStore, LastSession, ManifestState, SessionHistoryEntry, StateStore, StoreError, Task,
    TaskOutcome,
};

/// Attempts made to apply a transition before a write conflict is reported.
const TRANSITION_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no active task")]
    NoActiveTask,

    #[error("index {index} is out of range (queue holds {len} task(s), indices start at 1)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("abandoning a task requires a non-empty reason")]
    MissingReason,

    /// Only the active task can be completed.
    #[error("'{task}' is not the active task")]
    NotActive { task: String },

    /// The completion was appended but is not visible after reloading.
    #[error("completion of '{task}' is missing from history after recording it")]
    ReconciliationFailed { task: String },

    #[error("failed to append to graveyard {}", path.display())]
    Audit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SchedulerError {
    /// Errors caused by the caller's input rather than the system.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            SchedulerError::NoActiveTask
                | SchedulerError::IndexOutOfRange { .. }
                | SchedulerError::MissingReason
                | SchedulerError::NotActive { .. }
        )
    }
}

/// What `abandon` acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonTarget {
    Active,
    /// 1-based queue position, as shown by `list`.
    Index(usize),
    AllStale,
}

impl FromStr for AbandonTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AbandonTarget::Active),
            "all-stale" | "all_stale" => Ok(AbandonTarget::AllStale),
            other => other.parse::<usize>().map(AbandonTarget::Index).map_err(|_| {
                format!(
                    "invalid abandon target '{}' (expected 'active', 'all-stale' or a queue index)",
                    s
                )
            }),
        }
    }
}

/// A task moved into the active slot.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub task: Task,
    /// Score at promotion time; `None` for generated tasks.
    pub breakdown: Option<ScoreBreakdown>,
    pub generated: Option<GenerationRule>,
    /// Queued tasks buried on the way because they were already completed.
    pub pruned: Vec<(Task, Exclusion)>,
}

#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    Completed { task: Task, promotion: Promotion },
    /// The completion was already applied by an earlier call.
    AlreadyRecorded { task: Task },
}

#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub task: Task,
    /// Set when the queue had no active task and this add filled the slot.
    pub promotion: Option<Promotion>,
}

#[derive(Debug, Clone, Default)]
pub struct AbandonReport {
    pub abandoned: Vec<(Task, Option<StaleKind>)>,
    /// Set when the active task was abandoned.
    pub promotion: Option<Promotion>,
}

pub struct Scheduler<S: StateStore> {
    store: S,
    scorer: TaskScorer,
    generator: TaskGenerator,
    graveyard: Graveyard,
    abandon: AbandonSettings,
}

impl Scheduler<JsonFileStore> {
    /// Wire a scheduler around a JSON document: the graveyard sits next to it
    /// and the generator workspace defaults to its directory.
    pub fn open(store: JsonFileStore, settings: &Settings) -> Self {
        let workspace = store
            .path()
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        let graveyard = Graveyard::new(store.sibling(GRAVEYARD_FILE_NAME));
        Self::new(
            store,
            TaskScorer::new(settings.scoring.clone()),
            TaskGenerator::new(settings.generator.clone(), workspace),
            graveyard,
            settings.abandon.clone(),
        )
    }
}

impl<S: StateStore> Scheduler<S> {
    pub fn new(
        store: S,
        scorer: TaskScorer,
        generator: TaskGenerator,
        graveyard: Graveyard,
        abandon: AbandonSettings,
    ) -> Self {
        Self {
            store,
            scorer,
            generator,
            graveyard,
            abandon,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scorer(&self) -> &TaskScorer {
        &self.scorer
    }

    pub fn graveyard(&self) -> &Graveyard {
        &self.graveyard
    }

    // ── read-only views ───────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<ManifestState, SchedulerError> {
        Ok(self.store.load()?)
    }

    /// The active task and its current score.
    pub fn active(&self, state: &ManifestState, now: DateTime<Utc>) -> Option<(Task, ScoreBreakdown)> {
        let task = state.active_task.clone()?;
        let ctx = ScoringContext::from_state(state, now);
        let dominant = self.scorer.dominant_category(&state.session_history);
        let breakdown = self.scorer.evaluate(&task, &ctx, dominant);
        Some((task, breakdown))
    }

    /// The queue in selection order, without changing anything.
    pub fn ranking(&self, state: &ManifestState, now: DateTime<Utc>) -> Ranking {
        let ctx = ScoringContext::from_state(state, now);
        rank(&self.scorer, &state.task_queue, &ctx)
    }

    // ── transitions ───────────────────────────────────────────────────────────

    /// Queue a task. If nothing is active, the best candidate is promoted
    /// straight away.
    pub fn add(&self, task: Task, now: DateTime<Utc>) -> Result<AddOutcome, SchedulerError> {
        let outcome = self.transact(|state| {
            state.task_queue.push(task.clone());
            let promotion = if state.active_task.is_none() {
                Some(self.promote(state, now)?)
            } else {
                None
            };
            Ok(AddOutcome {
                task: task.clone(),
                promotion,
            })
        })?;
        info!("Queued task [{}]: {}", task.category, task.text);
        Ok(outcome)
    }

    /// Complete whatever is currently active.
    pub fn complete(&self, now: DateTime<Utc>) -> Result<CompletionOutcome, SchedulerError> {
        let state = self.store.load()?;
        let task = state.active_task.ok_or(SchedulerError::NoActiveTask)?;
        self.complete_task(&task, now)
    }

    /// Complete a specific task. Safe to retry: a second call for the same
    /// task records nothing and reports `AlreadyRecorded`.
    pub fn complete_task(
        &self,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, SchedulerError> {
        let current = self.store.load()?;
        if !current.is_active(&task.id) && !current.has_recorded(&task.id, TaskOutcome::Completed) {
            return Err(SchedulerError::NotActive {
                task: task.text.clone(),
            });
        }

        let entry = SessionHistoryEntry::for_task(task, TaskOutcome::Completed, now);
        SessionRecorder::new(&self.store).record(&entry)?;

        // Everything below works on a copy loaded after the append
        self.transact(|state| {
            if !state.has_recorded(&task.id, TaskOutcome::Completed) {
                return Err(SchedulerError::ReconciliationFailed {
                    task: task.text.clone(),
                });
            }
            if !state.is_active(&task.id) {
                debug!("Completion of '{}' already applied", task.text);
                return Ok(CompletionOutcome::AlreadyRecorded { task: task.clone() });
            }

            state.completed_signatures.insert(task.signature());
            state.last_session = Some(LastSession {
                date: now,
                focus: task.text.clone(),
                outcome: TaskOutcome::Completed,
            });
            state.active_task = None;
            let promotion = self.promote(state, now)?;
            Ok(CompletionOutcome::Completed {
                task: task.clone(),
                promotion,
            })
        })
        .inspect(|outcome| {
            if let CompletionOutcome::Completed { task, promotion } = outcome {
                info!("Completed '{}', now active: '{}'", task.text, promotion.task.text);
            }
        })
    }

    /// Abandon the active task, one queued task, or every stale one.
    ///
    /// Every abandoned task is written to the graveyard before the state
    /// change is saved. An out-of-range index leaves the queue untouched.
    pub fn abandon(
        &self,
        target: AbandonTarget,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AbandonReport, SchedulerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SchedulerError::MissingReason);
        }

        self.transact(|state| match target {
            AbandonTarget::Active => {
                let task = state.active_task.take().ok_or(SchedulerError::NoActiveTask)?;
                self.bury(&task, reason, None, now)?;
                state.session_history.push(SessionHistoryEntry::for_task(
                    &task,
                    TaskOutcome::Abandoned,
                    now,
                ));
                state.last_session = Some(LastSession {
                    date: now,
                    focus: task.text.clone(),
                    outcome: TaskOutcome::Abandoned,
                });
                let promotion = self.promote(state, now)?;
                Ok(AbandonReport {
                    abandoned: vec![(task, None)],
                    promotion: Some(promotion),
                })
            }
            AbandonTarget::Index(index) => {
                let len = state.task_queue.len();
                if index == 0 || index > len {
                    return Err(SchedulerError::IndexOutOfRange { index, len });
                }
                let task = state.task_queue.remove(index - 1);
                self.bury(&task, reason, None, now)?;
                Ok(AbandonReport {
                    abandoned: vec![(task, None)],
                    promotion: None,
                })
            }
            AbandonTarget::AllStale => {
                let selected = select_stale(
                    &state.task_queue,
                    state.active_task.as_ref(),
                    now,
                    &self.abandon,
                );
                let mut abandoned = Vec::with_capacity(selected.len());
                for (index, kind) in &selected {
                    let task = &state.task_queue[*index];
                    self.bury(task, reason, Some(kind.to_string()), now)?;
                    abandoned.push((task.clone(), Some(*kind)));
                }
                let mut position = 0;
                state.task_queue.retain(|_| {
                    let keep = !selected.iter().any(|(i, _)| *i == position);
                    position += 1;
                    keep
                });
                Ok(AbandonReport {
                    abandoned,
                    promotion: None,
                })
            }
        })
    }

    // ── internals ─────────────────────────────────────────────────────────────

    /// Fill the empty active slot from the queue, or from the generator when
    /// no queued task is eligible.
    fn promote(&self, state: &mut ManifestState, now: DateTime<Utc>) -> Result<Promotion, SchedulerError> {
        let queue = std::mem::take(&mut state.task_queue);
        let pick = {
            let ctx = ScoringContext {
                now,
                history: &state.session_history,
                completed: &state.completed_signatures,
                max_observed_skip: queue.iter().map(|t| t.skip_count).max().unwrap_or(0),
            };
            pick_next(&self.scorer, queue, &ctx)
        };

        // Finished work leaves the queue for good; anything merely seen in
        // recent history waits until the lookback window has passed.
        let (pruned, deferred): (Vec<_>, Vec<_>) = pick
            .excluded
            .into_iter()
            .partition(|(_, exclusion)| *exclusion == Exclusion::AlreadyCompleted);
        for (task, exclusion) in &pruned {
            self.bury(task, &exclusion.to_string(), None, now)?;
        }

        state.task_queue = pick.remaining;
        state
            .task_queue
            .extend(deferred.into_iter().map(|(task, _)| task));
        let promotion = match pick.chosen {
            Some((task, breakdown)) => {
                for waiting in &mut state.task_queue {
                    waiting.skip_count += 1;
                }
                info!("Promoted '{}' (score {:.3})", task.text, breakdown.adjusted);
                Promotion {
                    task,
                    breakdown: Some(breakdown),
                    generated: None,
                    pruned,
                }
            }
            None => {
                let (task, rule) = self.generator.generate(state, now);
                Promotion {
                    task,
                    breakdown: None,
                    generated: Some(rule),
                    pruned,
                }
            }
        };
        state.active_task = Some(promotion.task.clone());
        Ok(promotion)
    }

    fn bury(
        &self,
        task: &Task,
        reason: &str,
        detail: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let entry = GraveyardEntry::new(task, reason, detail, now);
        self.graveyard
            .bury(&entry)
            .map_err(|source| SchedulerError::Audit {
                path: self.graveyard.path().to_path_buf(),
                source,
            })
    }

    /// Load, apply, save; on a write conflict start over from a fresh load.
    fn transact<T, F>(&self, mut apply: F) -> Result<T, SchedulerError>
    where
        F: FnMut(&mut ManifestState) -> Result<T, SchedulerError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut state = self.store.load()?;
            let out = apply(&mut state)?;
            match self.store.save(&mut state) {
                Ok(()) => return Ok(out),
                Err(e) if e.is_conflict() && attempt < TRANSITION_ATTEMPTS => {
                    warn!("Transition conflicted (attempt {}), reloading: {}", attempt, e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
