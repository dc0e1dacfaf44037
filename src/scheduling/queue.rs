// Queue ranking and selection
//
// Ordering is total and deterministic: adjusted score descending, then
// declared priority ascending, then creation time ascending, then queue
// position.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use super::scorer::{Exclusion, ScoreBreakdown, ScoringContext, TaskScorer};
use crate::config::AbandonSettings;
use crate::state::{Category, Task};

/// A queued task with its score, identified by queue position.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTask {
    pub index: usize,
    pub breakdown: ScoreBreakdown,
}

/// Result of ranking a queue without changing it.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Eligible tasks in selection order.
    pub ranked: Vec<RankedTask>,
    /// Tasks removed by the anti-repetition filter.
    pub excluded: Vec<(usize, Exclusion)>,
    /// Category penalised by rotation, if any.
    pub dominant: Option<Category>,
}

/// Result of selecting the next active task.
#[derive(Debug, Clone)]
pub struct Pick {
    pub chosen: Option<(Task, ScoreBreakdown)>,
    /// Everything neither chosen nor excluded, in original queue order.
    pub remaining: Vec<Task>,
    pub excluded: Vec<(Task, Exclusion)>,
}

fn selection_order(a: (&Task, &ScoreBreakdown), b: (&Task, &ScoreBreakdown)) -> Ordering {
    b.1.adjusted
        .total_cmp(&a.1.adjusted)
        .then_with(|| a.0.priority.cmp(&b.0.priority))
        .then_with(|| a.0.created_at.cmp(&b.0.created_at))
}

/// Score every queued task and sort the eligible ones into selection order.
pub fn rank(scorer: &TaskScorer, queue: &[Task], ctx: &ScoringContext<'_>) -> Ranking {
    let dominant = scorer.dominant_category(ctx.history);
    let mut ranking = Ranking {
        dominant,
        ..Default::default()
    };

    for (index, task) in queue.iter().enumerate() {
        match scorer.exclusion(task, ctx) {
            Some(reason) => ranking.excluded.push((index, reason)),
            None => ranking.ranked.push(RankedTask {
                index,
                breakdown: scorer.evaluate(task, ctx, dominant),
            }),
        }
    }

    ranking.ranked.sort_by(|a, b| {
        selection_order(
            (&queue[a.index], &a.breakdown),
            (&queue[b.index], &b.breakdown),
        )
        .then_with(|| a.index.cmp(&b.index))
    });
    ranking
}

/// Take the best eligible task out of `queue`.
pub fn pick_next(scorer: &TaskScorer, queue: Vec<Task>, ctx: &ScoringContext<'_>) -> Pick {
    let ranking = rank(scorer, &queue, ctx);
    let chosen_index = ranking.ranked.first().map(|r| (r.index, r.breakdown));

    let mut chosen = None;
    let mut remaining = Vec::with_capacity(queue.len());
    let mut excluded = Vec::new();
    for (index, task) in queue.into_iter().enumerate() {
        if let Some((_, reason)) = ranking.excluded.iter().find(|(i, _)| *i == index) {
            excluded.push((task, *reason));
        } else if chosen_index.is_some_and(|(i, _)| i == index) {
            chosen = chosen_index.map(|(_, breakdown)| (task, breakdown));
        } else {
            remaining.push(task);
        }
    }

    Pick {
        chosen,
        remaining,
        excluded,
    }
}

/// Why a task qualified for the `all-stale` batch abandon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleKind {
    /// Old, repeatedly skipped, and in a low-stakes category.
    Neglected,
    /// Same text as a task seen earlier in the pass.
    Duplicate,
}

impl fmt::Display for StaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleKind::Neglected => f.write_str("stale"),
            StaleKind::Duplicate => f.write_str("duplicate"),
        }
    }
}

/// Queue positions selected by `all-stale`.
///
/// Only tasks older than `stale_age_hours` qualify at all. The active task
/// is never part of `queue`; its text seeds the duplicate check.
pub fn select_stale(
    queue: &[Task],
    active: Option<&Task>,
    now: DateTime<Utc>,
    settings: &AbandonSettings,
) -> Vec<(usize, StaleKind)> {
    let normalize = |text: &str| text.trim().to_lowercase();
    let mut seen: HashSet<String> = active.map(|t| normalize(&t.text)).into_iter().collect();
    let mut selected = Vec::new();

    for (index, task) in queue.iter().enumerate() {
        let key = normalize(&task.text);
        let duplicate = !seen.insert(key);
        if task.age_hours(now) <= settings.stale_age_hours {
            continue;
        }
        if task.skip_count > settings.stale_min_skips
            && settings.stale_categories.contains(&task.category)
        {
            selected.push((index, StaleKind::Neglected));
        } else if duplicate {
            selected.push((index, StaleKind::Duplicate));
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringSettings;
    use crate::state::{Impact, SessionHistoryEntry, TaskOutcome};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap()
    }

    fn scorer() -> TaskScorer {
        TaskScorer::new(ScoringSettings::default())
    }

    fn task(text: &str, category: Category, impact: Impact, hours_old: i64, skips: u32) -> Task {
        let mut t = Task::new(text, now() - Duration::hours(hours_old))
            .with_category(category)
            .with_impact(impact);
        t.skip_count = skips;
        t
    }

    fn ctx_for<'a>(
        queue: &[Task],
        history: &'a [SessionHistoryEntry],
        completed: &'a BTreeSet<String>,
    ) -> ScoringContext<'a> {
        ScoringContext {
            now: now(),
            history,
            completed,
            max_observed_skip: queue.iter().map(|t| t.skip_count).max().unwrap_or(0),
        }
    }

    // ── pick_next ─────────────────────────────────────────────────────────────

    #[test]
    fn test_neglected_maintenance_outranks_fresh_survival_by_formula() {
        let a = task("A", Category::Maintenance, Impact::Medium, 8 * 24, 6);
        let b = task("B", Category::Survival, Impact::High, 1, 0);
        let queue = vec![a.clone(), b.clone()];
        let completed = BTreeSet::new();
        let ctx = ctx_for(&queue, &[], &completed);
        let s = scorer();

        let sig = |hours: f64| 1.0 / (1.0 + (-(hours - 96.0) / 18.0).exp());
        let expected_a = 0.25 * sig(192.0) + 0.35 * 0.3 * 0.5 + 0.15 + 0.15 * (7f64.ln() / 7f64.ln());
        let expected_b = 0.25 * sig(1.0) + 0.35 * 1.0 * 0.75 + 0.15 + 0.0;

        let score_a = s.score(&a, &ctx);
        let score_b = s.score(&b, &ctx);
        assert!((score_a.impact - 0.0525).abs() < 1e-12);
        assert!((score_b.impact - 0.2625).abs() < 1e-12);
        assert!((score_a.base - expected_a).abs() < 1e-12);
        assert!((score_b.base - expected_b).abs() < 1e-12);
        assert!(expected_a > expected_b);

        let pick = pick_next(&s, queue, &ctx);
        let (chosen, _) = pick.chosen.unwrap();
        assert_eq!(chosen.text, "A");
        assert_eq!(pick.remaining.len(), 1);
        assert_eq!(pick.remaining[0].text, "B");
    }

    #[test]
    fn test_pick_next_returns_maximum_score() {
        let queue = vec![
            task("low", Category::NiceToHave, Impact::Low, 2, 0),
            task("top", Category::Survival, Impact::Critical, 2, 0),
            task("mid", Category::Research, Impact::Medium, 2, 0),
        ];
        let completed = BTreeSet::new();
        let ctx = ctx_for(&queue, &[], &completed);
        let pick = pick_next(&scorer(), queue, &ctx);
        assert_eq!(pick.chosen.unwrap().0.text, "top");
        let rest: Vec<_> = pick.remaining.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(rest, vec!["low", "mid"]);
    }

    #[test]
    fn test_ties_break_by_priority_then_oldest_first() {
        let created = now() - Duration::hours(5);
        let mk = |text: &str, priority: i32, created_at: DateTime<Utc>| {
            Task::new(text, created_at)
                .with_category(Category::Memory)
                .with_priority(priority)
        };
        let queue = vec![mk("p3", 3, created), mk("p1", 1, created), mk("p2", 2, created)];
        let completed = BTreeSet::new();
        let ctx = ctx_for(&queue, &[], &completed);
        let ranking = rank(&scorer(), &queue, &ctx);
        let order: Vec<_> = ranking.ranked.iter().map(|r| queue[r.index].text.as_str()).collect();
        assert_eq!(order, vec!["p1", "p2", "p3"]);

        // Zero urgency weight makes age irrelevant to the score, leaving
        // createdAt as a pure tie-breaker.
        let mut settings = ScoringSettings::default();
        settings.weights.urgency = 0.0;
        settings.weights.impact = 0.60;
        let flat = TaskScorer::new(settings);
        let queue = vec![
            mk("newer", 2, now() - Duration::hours(1)),
            mk("older", 2, now() - Duration::hours(9)),
        ];
        let ctx = ctx_for(&queue, &[], &completed);
        let pick = pick_next(&flat, queue, &ctx);
        assert_eq!(pick.chosen.unwrap().0.text, "older");
    }

    #[test]
    fn test_excluded_tasks_are_separated_not_chosen() {
        let queue = vec![
            task("Refresh the index", Category::Memory, Impact::Critical, 300, 9),
            task("Sketch a plan", Category::Expansion, Impact::Low, 1, 0),
        ];
        let completed = BTreeSet::from(["refresh the index".to_string()]);
        let ctx = ctx_for(&queue, &[], &completed);
        let pick = pick_next(&scorer(), queue, &ctx);
        assert_eq!(pick.chosen.unwrap().0.text, "Sketch a plan");
        assert!(pick.remaining.is_empty());
        assert_eq!(pick.excluded.len(), 1);
        assert_eq!(pick.excluded[0].1, Exclusion::AlreadyCompleted);
    }

    #[test]
    fn test_all_excluded_yields_no_choice() {
        let queue = vec![task("Done thing", Category::Memory, Impact::High, 3, 0)];
        let completed = BTreeSet::from(["done thing".to_string()]);
        let ctx = ctx_for(&queue, &[], &completed);
        let pick = pick_next(&scorer(), queue, &ctx);
        assert!(pick.chosen.is_none());
        assert!(pick.remaining.is_empty());
    }

    #[test]
    fn test_empty_queue() {
        let completed = BTreeSet::new();
        let ctx = ctx_for(&[], &[], &completed);
        let pick = pick_next(&scorer(), Vec::new(), &ctx);
        assert!(pick.chosen.is_none());
    }

    #[test]
    fn test_rotation_lets_starved_category_win() {
        let history: Vec<SessionHistoryEntry> = (0..3)
            .map(|i| {
                let t = Task::new(format!("research {}", i), now()).with_category(Category::Research);
                SessionHistoryEntry::for_task(&t, TaskOutcome::Completed, now() - Duration::hours(i))
            })
            .collect();
        let queue = vec![
            task("Investigate graphs", Category::Research, Impact::High, 24, 0),
            task("Prune old drafts", Category::Maintenance, Impact::High, 24, 0),
        ];
        let completed = BTreeSet::new();

        // Without history, research (0.5) beats maintenance (0.3)
        let ctx = ctx_for(&queue, &[], &completed);
        let pick = pick_next(&scorer(), queue.clone(), &ctx);
        assert_eq!(pick.chosen.unwrap().0.text, "Investigate graphs");

        // After a research streak, maintenance gets its turn
        let ctx = ctx_for(&queue, &history, &completed);
        let ranking = rank(&scorer(), &queue, &ctx);
        assert_eq!(ranking.dominant, Some(Category::Research));
        let pick = pick_next(&scorer(), queue, &ctx);
        assert_eq!(pick.chosen.unwrap().0.text, "Prune old drafts");
    }

    // ── select_stale ──────────────────────────────────────────────────────────

    fn abandon_settings() -> AbandonSettings {
        AbandonSettings::default()
    }

    #[test]
    fn test_select_stale_requires_age_skips_and_category() {
        let queue = vec![
            task("old neglected chore", Category::Maintenance, Impact::Low, 200, 6),
            task("old but rarely skipped", Category::Maintenance, Impact::Low, 200, 5),
            task("young neglected", Category::Maintenance, Impact::Low, 100, 9),
            task("old neglected survival", Category::Survival, Impact::Low, 400, 9),
            task("old research", Category::Research, Impact::Low, 169, 7),
        ];
        let selected = select_stale(&queue, None, now(), &abandon_settings());
        assert_eq!(
            selected,
            vec![(0, StaleKind::Neglected), (4, StaleKind::Neglected)]
        );
    }

    #[test]
    fn test_select_stale_flags_duplicates_of_earlier_tasks() {
        let queue = vec![
            task("Write summary", Category::Expansion, Impact::Low, 300, 0),
            task("write summary ", Category::Expansion, Impact::Low, 200, 0),
            task("Write summary", Category::Expansion, Impact::Low, 2, 0),
        ];
        let selected = select_stale(&queue, None, now(), &abandon_settings());
        // The young copy is a duplicate too, but below the age threshold
        assert_eq!(selected, vec![(1, StaleKind::Duplicate)]);
    }

    #[test]
    fn test_select_stale_never_touches_young_tasks_or_active() {
        let active = task("Plan week", Category::Expansion, Impact::Low, 500, 10);
        let queue = vec![
            task("Plan week", Category::Expansion, Impact::Low, 300, 0),
            task("Plan week", Category::Expansion, Impact::Low, 5, 0),
        ];
        let selected = select_stale(&queue, Some(&active), now(), &abandon_settings());
        assert_eq!(selected, vec![(0, StaleKind::Duplicate)]);
        for (i, _) in &selected {
            assert!(queue[*i].age_hours(now()) > 168.0);
            assert_ne!(queue[*i].id, active.id);
        }
    }
}
