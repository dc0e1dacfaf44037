// Plain-text rendering for command output

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::agent::current_streak;
use crate::scheduling::{
    AbandonReport, CompletionOutcome, Promotion, Ranking, ScoreBreakdown,
};
use crate::state::{ManifestState, SessionHistoryEntry, Task};

fn task_summary(task: &Task) -> String {
    let mut line = format!("{} [{} / {}]", task.text, task.category, task.impact);
    if task.blocks_others {
        line.push_str(" (blocks others)");
    }
    line
}

pub fn breakdown(b: &ScoreBreakdown) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  urgency       {:.4}", b.urgency);
    let _ = writeln!(out, "  impact        {:.4}", b.impact);
    let _ = writeln!(out, "  dependencies  {:.4}", b.dependencies);
    let _ = writeln!(out, "  skip decay    {:.4}", b.skip_decay);
    let _ = writeln!(out, "  blocker       {:.4}", b.blocker);
    let _ = writeln!(out, "  base          {:.4}", b.base);
    if b.rotation_penalty > 0.0 {
        let _ = writeln!(out, "  rotation      -{:.0}%", b.rotation_penalty * 100.0);
    }
    let _ = writeln!(out, "  score         {:.4}", b.adjusted);
    out
}

pub fn active(current: Option<&(Task, ScoreBreakdown)>, now: DateTime<Utc>) -> String {
    let Some((task, b)) = current else {
        return "No active task. Add one with `cairn add <text>`.\n".to_string();
    };
    let mut out = format!("Active: {}\n", task_summary(task));
    if !task.context.is_empty() {
        let _ = writeln!(out, "Context: {}", task.context);
    }
    let _ = writeln!(
        out,
        "Age {:.1}h, skipped {}x, source {}",
        task.age_hours(now),
        task.skip_count,
        task.source
    );
    out.push_str(&breakdown(b));
    out
}

pub fn promotion(p: &Promotion) -> String {
    let mut out = String::new();
    for (task, exclusion) in &p.pruned {
        let _ = writeln!(out, "Pruned: {} ({})", task.text, exclusion);
    }
    match (&p.generated, &p.breakdown) {
        (Some(rule), _) => {
            let _ = writeln!(out, "Next (generated by {}): {}", rule, task_summary(&p.task));
        }
        (None, Some(b)) => {
            let _ = writeln!(out, "Next: {} score {:.4}", task_summary(&p.task), b.adjusted);
        }
        (None, None) => {
            let _ = writeln!(out, "Next: {}", task_summary(&p.task));
        }
    }
    out
}

pub fn completion(outcome: &CompletionOutcome) -> String {
    match outcome {
        CompletionOutcome::Completed { task, promotion: p } => {
            format!("Completed: {}\n{}", task.text, promotion(p))
        }
        CompletionOutcome::AlreadyRecorded { task } => {
            format!("Already recorded as completed: {}\n", task.text)
        }
    }
}

pub fn abandon_report(report: &AbandonReport) -> String {
    if report.abandoned.is_empty() {
        return "Nothing to abandon.\n".to_string();
    }
    let mut out = String::new();
    for (task, kind) in &report.abandoned {
        match kind {
            Some(kind) => {
                let _ = writeln!(out, "Abandoned ({}): {}", kind, task.text);
            }
            None => {
                let _ = writeln!(out, "Abandoned: {}", task.text);
            }
        }
    }
    if let Some(p) = &report.promotion {
        out.push_str(&promotion(p));
    }
    out
}

/// Queue in selection order. Positions are the 1-based indices `abandon` takes.
pub fn queue(state: &ManifestState, ranking: &Ranking) -> String {
    if state.task_queue.is_empty() {
        return "Queue is empty.\n".to_string();
    }
    let mut out = String::new();
    for (rank, entry) in ranking.ranked.iter().enumerate() {
        let task = &state.task_queue[entry.index];
        let _ = writeln!(
            out,
            "{:>2}. #{:<3} {:.4}  {}",
            rank + 1,
            entry.index + 1,
            entry.breakdown.adjusted,
            task_summary(task)
        );
    }
    for (index, exclusion) in &ranking.excluded {
        let _ = writeln!(
            out,
            "  -  #{:<3} excluded ({})  {}",
            index + 1,
            exclusion,
            state.task_queue[*index].text
        );
    }
    out
}

pub fn scores(state: &ManifestState, ranking: &Ranking) -> String {
    if state.task_queue.is_empty() {
        return "Queue is empty.\n".to_string();
    }
    let mut out = String::new();
    if let Some(category) = ranking.dominant {
        let _ = writeln!(out, "Rotation penalty applies to: {}\n", category);
    }
    for entry in &ranking.ranked {
        let task = &state.task_queue[entry.index];
        let _ = writeln!(out, "#{} {}", entry.index + 1, task_summary(task));
        out.push_str(&breakdown(&entry.breakdown));
        out.push('\n');
    }
    for (index, exclusion) in &ranking.excluded {
        let _ = writeln!(
            out,
            "#{} {}\n  excluded: {}\n",
            index + 1,
            state.task_queue[*index].text,
            exclusion
        );
    }
    out
}

/// Most recent `limit` entries, newest last, plus the current streak.
pub fn history(entries: &[SessionHistoryEntry], limit: usize) -> String {
    if entries.is_empty() {
        return "No session history.\n".to_string();
    }
    let start = entries.len().saturating_sub(limit);
    let mut out = String::new();
    for entry in &entries[start..] {
        let _ = writeln!(
            out,
            "{}  {:<9}  {:<14}  {}",
            entry.date.format("%Y-%m-%d %H:%M"),
            entry.outcome,
            entry.category,
            entry.task_name
        );
    }
    if let Some((category, len)) = current_streak(entries) {
        let _ = writeln!(out, "\nStreak: {} x{}", category, len);
    }
    out
}
