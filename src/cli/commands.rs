// Command dispatch

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use super::render;
use super::{Cli, Commands};
use crate::config::{default_state_path, load_settings, validate_state_config, Settings};
use crate::memory::{apply_decay, rank_artifacts, render_boot, WeightModel};
use crate::scheduling::{AbandonTarget, Scheduler, SchedulerError};
use crate::state::{JsonFileStore, StateConfig, StateStore, Task, TrackedArtifact};

/// Bad input that is not a scheduler transition error.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// Whether `err` stems from caller input (exit status 2) rather than a
/// system failure.
pub fn is_usage_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.downcast_ref::<UsageError>().is_some()
            || cause
                .downcast_ref::<SchedulerError>()
                .is_some_and(SchedulerError::is_usage)
    })
}

/// Run one command against the real clock, printing to stdout.
pub fn run(cli: &Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli, Utc::now(), &mut out)
}

/// Run one command at `now`, writing its output to `out`.
pub fn execute(cli: &Cli, now: DateTime<Utc>, out: &mut impl Write) -> Result<()> {
    let settings = load_settings(cli.config.as_deref())?;
    let state_path = match &cli.state {
        Some(path) => path.clone(),
        None => default_state_path()?,
    };

    match &cli.command {
        Commands::Init => init(&state_path, out),
        Commands::Next => {
            let scheduler = open(&state_path, &settings);
            let state = scheduler.snapshot()?;
            let current = scheduler.active(&state, now);
            write!(out, "{}", render::active(current.as_ref(), now))?;
            Ok(())
        }
        Commands::Complete => {
            let scheduler = open(&state_path, &settings);
            let outcome = scheduler.complete(now)?;
            write!(out, "{}", render::completion(&outcome))?;
            Ok(())
        }
        Commands::Add {
            text,
            context,
            priority,
            category,
            impact,
            tags,
            blocks_others,
            depends_on,
        } => {
            if text.trim().is_empty() {
                return Err(UsageError("task text must not be empty".into()).into());
            }
            let mut task = Task::new(text.trim(), now)
                .with_context(context.as_str())
                .with_source("cli");
            if let Some(category) = category {
                task = task.with_category(*category);
            }
            if let Some(impact) = impact {
                task = task.with_impact(*impact);
            }
            if let Some(priority) = priority {
                task = task.with_priority(*priority);
            }
            task = task.with_tags(tags.iter().cloned());
            if *blocks_others {
                task = task.blocking();
            }
            for dep in depends_on {
                task = task.depending_on(dep.as_str());
            }

            let scheduler = open(&state_path, &settings);
            let outcome = scheduler.add(task, now)?;
            writeln!(
                out,
                "Queued [{}]: {} ({})",
                outcome.task.category, outcome.task.text, outcome.task.id
            )?;
            if let Some(p) = &outcome.promotion {
                write!(out, "{}", render::promotion(p))?;
            }
            Ok(())
        }
        Commands::List => {
            let scheduler = open(&state_path, &settings);
            let state = scheduler.snapshot()?;
            let ranking = scheduler.ranking(&state, now);
            write!(out, "{}", render::queue(&state, &ranking))?;
            Ok(())
        }
        Commands::Score => {
            let scheduler = open(&state_path, &settings);
            let state = scheduler.snapshot()?;
            let ranking = scheduler.ranking(&state, now);
            write!(out, "{}", render::scores(&state, &ranking))?;
            Ok(())
        }
        Commands::Abandon { target, reason } => {
            let reason = reason.clone().unwrap_or_else(|| match target {
                AbandonTarget::AllStale => "stale".to_string(),
                _ => "abandoned manually".to_string(),
            });
            let scheduler = open(&state_path, &settings);
            let report = scheduler.abandon(*target, &reason, now)?;
            write!(out, "{}", render::abandon_report(&report))?;
            Ok(())
        }
        Commands::Track {
            path,
            kind,
            weight,
            decay_rate,
            summary,
        } => {
            if !(0.0..=1.0).contains(weight) {
                return Err(UsageError(format!("weight {} is outside [0, 1]", weight)).into());
            }
            if decay_rate.is_some_and(|r| r < 0.0) {
                return Err(UsageError("decay rate must not be negative".into()).into());
            }
            let store = JsonFileStore::new(&state_path);
            let today = now.date_naive();
            let artifact = store.update(|state| {
                let mut artifact = TrackedArtifact::new(*kind, *weight, today);
                if let Some(rate) = decay_rate {
                    artifact.decay_rate = *rate;
                }
                artifact.summary = summary.clone();
                if let Some(existing) = state.artifacts.get(path) {
                    artifact.access_count = existing.access_count;
                }
                state.artifacts.insert(path.clone(), artifact.clone());
                artifact
            })?;
            tracing::info!("Tracking {} as {}", path, artifact.kind);
            writeln!(
                out,
                "Tracking {} [{}] base weight {:.3}",
                path, artifact.kind, artifact.base_weight
            )?;
            Ok(())
        }
        Commands::Touch { path } => {
            let store = JsonFileStore::new(&state_path);
            let today = now.date_naive();
            let touched = store.update(|state| {
                state.artifacts.get_mut(path).map(|artifact| {
                    artifact.record_access(today);
                    artifact.access_count
                })
            })?;
            match touched {
                Some(count) => {
                    writeln!(out, "Touched {} ({} accesses)", path, count)?;
                    Ok(())
                }
                None => Err(UsageError(format!(
                    "artifact '{}' is not tracked (use `cairn track`)",
                    path
                ))
                .into()),
            }
        }
        Commands::Decay => {
            let store = JsonFileStore::new(&state_path);
            validate_state_config(&store.load()?.config)
                .context("State document carries an invalid config block")?;
            let today = now.date_naive();
            let report = store.update(|state| {
                let touched: BTreeSet<String> = state
                    .artifacts
                    .iter()
                    .filter(|(_, a)| a.last_access == today)
                    .map(|(p, _)| p.clone())
                    .collect();
                apply_decay(state, today, &touched)
            })?;
            if report.already_ran {
                writeln!(out, "Decay already ran today.")?;
            } else {
                writeln!(
                    out,
                    "Decayed {} artifact(s), {} at their floor.",
                    report.decayed, report.floored
                )?;
            }
            Ok(())
        }
        Commands::Boot => {
            let store = JsonFileStore::new(&state_path);
            let state = store.load()?;
            validate_state_config(&state.config)
                .context("State document carries an invalid config block")?;
            let model = WeightModel::new(&settings.weight, &state.config);
            let entries = rank_artifacts(&state, &model, now.date_naive());
            write!(out, "{}", render_boot(&entries))?;
            Ok(())
        }
        Commands::History { limit } => {
            let store = JsonFileStore::new(&state_path);
            let state = store.load()?;
            write!(out, "{}", render::history(&state.session_history, *limit))?;
            Ok(())
        }
    }
}

fn open(state_path: &Path, settings: &Settings) -> Scheduler<JsonFileStore> {
    Scheduler::open(JsonFileStore::new(state_path), settings)
}

fn init(state_path: &Path, out: &mut impl Write) -> Result<()> {
    let store = JsonFileStore::init(state_path, StateConfig::default())?;
    writeln!(out, "Initialized {}", store.path().display())?;
    Ok(())
}
