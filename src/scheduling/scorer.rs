// Task priority scoring
//
// score = Σ weight_i × signal_i over five signals, each in [0, 1]:
//
//   urgency       sigmoid over task age (midpoint 96h, ~saturated at 168h)
//   impact        category weight × impact weight
//   dependencies  resolved prerequisites / declared prerequisites (1.0 if none)
//   skip decay    ln(skips + 1) / ln(max observed skips + 1)
//   blocker       1.0 when the task blocks others
//
// Two guards run around the sum: recently finished work is excluded outright,
// and a category that dominated the last few sessions is penalised.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::ScoringSettings;
use crate::state::{
    signature_of, Category, ManifestState, SessionHistoryEntry, Task, TaskOutcome,
};

/// Everything outside the task itself that the score depends on.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub now: DateTime<Utc>,
    pub history: &'a [SessionHistoryEntry],
    pub completed: &'a BTreeSet<String>,
    /// Highest skip count among the candidates being ranked.
    pub max_observed_skip: u32,
}

impl<'a> ScoringContext<'a> {
    pub fn from_state(state: &'a ManifestState, now: DateTime<Utc>) -> Self {
        Self {
            now,
            history: &state.session_history,
            completed: &state.completed_signatures,
            max_observed_skip: state.task_queue.iter().map(|t| t.skip_count).max().unwrap_or(0),
        }
    }
}

/// Weighted contribution of each signal, plus the rotation adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub urgency: f64,
    pub impact: f64,
    pub dependencies: f64,
    pub skip_decay: f64,
    pub blocker: f64,
    /// Sum of the five contributions, in [0, 1].
    pub base: f64,
    /// Fraction removed by category rotation (0 when not applied).
    pub rotation_penalty: f64,
    /// The value used for ranking.
    pub adjusted: f64,
}

/// Why a candidate was removed before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Signature is in the completed set.
    AlreadyCompleted,
    /// Same normalized text appears in session history inside the lookback window.
    RecentlyInHistory(TaskOutcome),
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::AlreadyCompleted => f.write_str("already completed"),
            Exclusion::RecentlyInHistory(outcome) => write!(f, "recently {}", outcome),
        }
    }
}

pub struct TaskScorer {
    settings: ScoringSettings,
}

impl TaskScorer {
    pub fn new(settings: ScoringSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    // ── signals (unweighted, each in [0, 1]) ──────────────────────────────────

    pub fn urgency_signal(&self, task: &Task, now: DateTime<Utc>) -> f64 {
        let x = (task.age_hours(now) - self.settings.urgency_midpoint_hours)
            / self.settings.urgency_steepness_hours;
        1.0 / (1.0 + (-x).exp())
    }

    pub fn impact_signal(&self, task: &Task) -> f64 {
        self.settings.category_weights.get(task.category) * task.impact.weight()
    }

    pub fn dependency_signal(task: &Task, ctx: &ScoringContext<'_>) -> f64 {
        if task.depends_on.is_empty() {
            return 1.0;
        }
        let resolved = task
            .depends_on
            .iter()
            .filter(|dep| is_resolved(dep, ctx))
            .count();
        resolved as f64 / task.depends_on.len() as f64
    }

    pub fn skip_signal(task: &Task, max_observed_skip: u32) -> f64 {
        if max_observed_skip == 0 {
            return 0.0;
        }
        let value = (task.skip_count as f64 + 1.0).ln() / (max_observed_skip as f64 + 1.0).ln();
        value.min(1.0)
    }

    pub fn blocker_signal(task: &Task) -> f64 {
        if task.blocks_others {
            1.0
        } else {
            0.0
        }
    }

    // ── combined score ────────────────────────────────────────────────────────

    /// Raw weighted score, no rotation penalty.
    pub fn score(&self, task: &Task, ctx: &ScoringContext<'_>) -> ScoreBreakdown {
        let w = &self.settings.weights;
        let urgency = w.urgency * self.urgency_signal(task, ctx.now);
        let impact = w.impact * self.impact_signal(task);
        let dependencies = w.dependencies * Self::dependency_signal(task, ctx);
        let skip_decay = w.skip_decay * Self::skip_signal(task, ctx.max_observed_skip);
        let blocker = w.blocker * Self::blocker_signal(task);
        let base = urgency + impact + dependencies + skip_decay + blocker;
        ScoreBreakdown {
            urgency,
            impact,
            dependencies,
            skip_decay,
            blocker,
            base,
            rotation_penalty: 0.0,
            adjusted: base,
        }
    }

    /// Score with the category-rotation penalty applied when `task` belongs
    /// to the dominant category.
    pub fn evaluate(
        &self,
        task: &Task,
        ctx: &ScoringContext<'_>,
        dominant: Option<Category>,
    ) -> ScoreBreakdown {
        let mut breakdown = self.score(task, ctx);
        if dominant == Some(task.category) && self.settings.rotation_penalty > 0.0 {
            breakdown.rotation_penalty = self.settings.rotation_penalty;
            breakdown.adjusted = breakdown.base * (1.0 - self.settings.rotation_penalty);
        }
        breakdown
    }

    // ── guards ────────────────────────────────────────────────────────────────

    /// The category holding at least `rotation_threshold` of the last
    /// `rotation_window` history entries, if any.
    pub fn dominant_category(&self, history: &[SessionHistoryEntry]) -> Option<Category> {
        let window = self.settings.rotation_window;
        if history.len() < window || window == 0 {
            return None;
        }
        let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
        for entry in &history[history.len() - window..] {
            *counts.entry(entry.category).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n >= self.settings.rotation_threshold)
            .max_by_key(|(_, n)| *n)
            .map(|(category, _)| category)
    }

    /// Exclusion filter applied before scoring.
    pub fn exclusion(&self, task: &Task, ctx: &ScoringContext<'_>) -> Option<Exclusion> {
        let signature = task.signature();
        if ctx.completed.contains(&signature) {
            return Some(Exclusion::AlreadyCompleted);
        }
        let cutoff = ctx.now - Duration::days(self.settings.history_lookback_days);
        ctx.history
            .iter()
            .rev()
            .filter(|e| e.date >= cutoff)
            .find(|e| signature_of(&e.task_name) == signature)
            .map(|e| Exclusion::RecentlyInHistory(e.outcome))
    }
}

fn is_resolved(dependency: &str, ctx: &ScoringContext<'_>) -> bool {
    let by_id = ctx
        .history
        .iter()
        .any(|e| e.outcome == TaskOutcome::Completed && e.task_id.as_deref() == Some(dependency));
    by_id || ctx.completed.contains(&signature_of(dependency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Impact;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 10, 12, 0, 0).unwrap()
    }

    fn scorer() -> TaskScorer {
        TaskScorer::new(ScoringSettings::default())
    }

    fn ctx<'a>(
        history: &'a [SessionHistoryEntry],
        completed: &'a BTreeSet<String>,
        max_skip: u32,
    ) -> ScoringContext<'a> {
        ScoringContext {
            now: now(),
            history,
            completed,
            max_observed_skip: max_skip,
        }
    }

    fn aged(text: &str, hours: i64) -> Task {
        Task::new(text, now() - Duration::hours(hours))
    }

    fn history_entry(text: &str, category: Category, days_ago: i64) -> SessionHistoryEntry {
        let task = Task::new(text, now()).with_category(category);
        SessionHistoryEntry::for_task(&task, TaskOutcome::Completed, now() - Duration::days(days_ago))
    }

    // ── urgency ───────────────────────────────────────────────────────────────

    #[test]
    fn test_urgency_midpoint_and_saturation() {
        let s = scorer();
        assert!((s.urgency_signal(&aged("x", 96), now()) - 0.5).abs() < 1e-9);
        assert!(s.urgency_signal(&aged("x", 168), now()) > 0.98);
        assert!(s.urgency_signal(&aged("x", 0), now()) < 0.01);
    }

    #[test]
    fn test_urgency_is_monotonic_in_age() {
        let s = scorer();
        let mut last = 0.0;
        for hours in (0..=240).step_by(12) {
            let u = s.urgency_signal(&aged("x", hours), now());
            assert!(u >= last);
            last = u;
        }
    }

    // ── impact ────────────────────────────────────────────────────────────────

    #[test]
    fn test_impact_is_category_times_impact_weight() {
        let s = scorer();
        let task = aged("x", 0).with_category(Category::Survival).with_impact(Impact::High);
        assert!((s.impact_signal(&task) - 0.75).abs() < 1e-12);
        let task = aged("x", 0).with_category(Category::Maintenance).with_impact(Impact::Medium);
        assert!((s.impact_signal(&task) - 0.15).abs() < 1e-12);
    }

    // ── dependencies ──────────────────────────────────────────────────────────

    #[test]
    fn test_no_dependencies_is_full_credit() {
        let completed = BTreeSet::new();
        assert_eq!(TaskScorer::dependency_signal(&aged("x", 0), &ctx(&[], &completed, 0)), 1.0);
    }

    #[test]
    fn test_dependencies_resolved_by_id_or_signature() {
        let done = Task::new("Set up the index", now());
        let history = vec![SessionHistoryEntry::for_task(&done, TaskOutcome::Completed, now())];
        let completed = BTreeSet::from(["write the outline".to_string()]);
        let task = aged("Publish digest", 1)
            .depending_on(done.id.clone())
            .depending_on("Write the outline!")
            .depending_on("unknown-task")
            .depending_on("another");
        let signal = TaskScorer::dependency_signal(&task, &ctx(&history, &completed, 0));
        assert!((signal - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_abandoned_prerequisite_is_not_resolved() {
        let dropped = Task::new("Prototype", now());
        let history = vec![SessionHistoryEntry::for_task(&dropped, TaskOutcome::Abandoned, now())];
        let completed = BTreeSet::new();
        let task = aged("Ship", 1).depending_on(dropped.id.clone());
        assert_eq!(TaskScorer::dependency_signal(&task, &ctx(&history, &completed, 0)), 0.0);
    }

    // ── skip decay ────────────────────────────────────────────────────────────

    #[test]
    fn test_skip_signal_is_log_scaled_and_capped() {
        let mut task = aged("x", 0);
        assert_eq!(TaskScorer::skip_signal(&task, 0), 0.0);
        task.skip_count = 3;
        assert!((TaskScorer::skip_signal(&task, 7) - 4f64.ln() / 8f64.ln()).abs() < 1e-12);
        task.skip_count = 9;
        assert_eq!(TaskScorer::skip_signal(&task, 7), 1.0);
    }

    // ── totals ────────────────────────────────────────────────────────────────

    #[test]
    fn test_score_stays_within_unit_interval() {
        let s = scorer();
        let completed = BTreeSet::new();
        let mut task = aged("x", 10_000)
            .with_category(Category::Survival)
            .with_impact(Impact::Critical)
            .blocking();
        task.skip_count = 50;
        let b = s.score(&task, &ctx(&[], &completed, 50));
        assert!(b.base <= 1.0 + 1e-12);
        assert!(b.base > 0.99);

        let task = aged("y", 0).with_category(Category::NiceToHave).with_impact(Impact::Low);
        let b = s.score(&task, &ctx(&[], &completed, 50));
        assert!(b.base >= 0.0);
    }

    #[test]
    fn test_breakdown_sums_to_base() {
        let s = scorer();
        let completed = BTreeSet::new();
        let task = aged("Restore backup", 50).blocking();
        let b = s.score(&task, &ctx(&[], &completed, 0));
        let sum = b.urgency + b.impact + b.dependencies + b.skip_decay + b.blocker;
        assert!((b.base - sum).abs() < 1e-12);
        assert_eq!(b.blocker, 0.10);
        assert_eq!(b.adjusted, b.base);
    }

    // ── rotation ──────────────────────────────────────────────────────────────

    #[test]
    fn test_dominant_category_requires_full_streak_by_default() {
        let s = scorer();
        let streak = vec![
            history_entry("a", Category::Memory, 3),
            history_entry("b", Category::Research, 2),
            history_entry("c", Category::Research, 1),
            history_entry("d", Category::Research, 0),
        ];
        assert_eq!(s.dominant_category(&streak), Some(Category::Research));

        let mixed = vec![
            history_entry("b", Category::Research, 2),
            history_entry("c", Category::Memory, 1),
            history_entry("d", Category::Research, 0),
        ];
        assert_eq!(s.dominant_category(&mixed), None);
        assert_eq!(s.dominant_category(&mixed[..2]), None);
    }

    #[test]
    fn test_rotation_threshold_is_configurable() {
        let s = TaskScorer::new(ScoringSettings {
            rotation_threshold: 2,
            ..ScoringSettings::default()
        });
        let mixed = vec![
            history_entry("b", Category::Research, 2),
            history_entry("c", Category::Memory, 1),
            history_entry("d", Category::Research, 0),
        ];
        assert_eq!(s.dominant_category(&mixed), Some(Category::Research));
    }

    #[test]
    fn test_rotation_penalty_only_hits_dominant_category() {
        let s = scorer();
        let completed = BTreeSet::new();
        let c = ctx(&[], &completed, 0);
        let research = aged("Investigate lattices", 10);
        let memory = aged("Consolidate notes", 10);
        let penalised = s.evaluate(&research, &c, Some(Category::Research));
        assert_eq!(penalised.rotation_penalty, 0.5);
        assert!((penalised.adjusted - penalised.base * 0.5).abs() < 1e-12);
        let untouched = s.evaluate(&memory, &c, Some(Category::Research));
        assert_eq!(untouched.adjusted, untouched.base);
    }

    // ── exclusion ─────────────────────────────────────────────────────────────

    #[test]
    fn test_completed_signature_excludes() {
        let s = scorer();
        let completed = BTreeSet::from(["refresh the index".to_string()]);
        let task = aged("Refresh the INDEX.", 1);
        assert_eq!(
            s.exclusion(&task, &ctx(&[], &completed, 0)),
            Some(Exclusion::AlreadyCompleted)
        );
    }

    #[test]
    fn test_recent_history_excludes_within_lookback_only() {
        let s = scorer();
        let completed = BTreeSet::new();
        let recent = vec![history_entry("Tidy drafts", Category::Maintenance, 2)];
        let task = aged("tidy drafts", 1);
        assert_eq!(
            s.exclusion(&task, &ctx(&recent, &completed, 0)),
            Some(Exclusion::RecentlyInHistory(TaskOutcome::Completed))
        );

        let old = vec![history_entry("Tidy drafts", Category::Maintenance, 30)];
        assert_eq!(s.exclusion(&task, &ctx(&old, &completed, 0)), None);
    }

    #[test]
    fn test_exclusion_display() {
        assert_eq!(Exclusion::AlreadyCompleted.to_string(), "already completed");
        assert_eq!(
            Exclusion::RecentlyInHistory(TaskOutcome::Abandoned).to_string(),
            "recently abandoned"
        );
    }
}
