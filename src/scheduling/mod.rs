// Task scheduling
//
// Scores the queue, picks the single active task, and drives the
// Queued -> Active -> Completed | Abandoned transitions through the store.

pub mod queue;
pub mod scheduler;
pub mod scorer;

pub use queue::{pick_next, rank, select_stale, Pick, RankedTask, Ranking, StaleKind};
pub use scheduler::{
    AbandonReport, AbandonTarget, AddOutcome, CompletionOutcome, Promotion, Scheduler,
    SchedulerError,
};
pub use scorer::{Exclusion, ScoreBreakdown, ScoringContext, TaskScorer};
