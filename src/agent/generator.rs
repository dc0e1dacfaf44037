// Fallback task generator
//
// Runs only when the queue is empty at promotion time. Rules are checked in a
// fixed order and the first match wins; the last rule always matches, so the
// generator never comes back empty-handed.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use super::staleness;
use crate::config::GeneratorSettings;
use crate::state::{signature_of, Category, Impact, ManifestState, Task};

/// Which rule produced a generated task. Stored in `Task::source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationRule {
    MissingStructure,
    StaleArtifacts,
    ModificationBurst,
    RecentTopic,
    StrategicPlanning,
}

impl GenerationRule {
    pub fn source(self) -> &'static str {
        match self {
            GenerationRule::MissingStructure => "generator:missing-structure",
            GenerationRule::StaleArtifacts => "generator:stale-artifacts",
            GenerationRule::ModificationBurst => "generator:modification-burst",
            GenerationRule::RecentTopic => "generator:recent-topic",
            GenerationRule::StrategicPlanning => "generator:strategic-planning",
        }
    }
}

impl fmt::Display for GenerationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

/// Number of example paths listed in a generated task's context.
const CONTEXT_SAMPLE: usize = 5;

pub struct TaskGenerator {
    settings: GeneratorSettings,
    workspace: PathBuf,
}

impl TaskGenerator {
    pub fn new(settings: GeneratorSettings, default_workspace: impl Into<PathBuf>) -> Self {
        let workspace = settings
            .workspace
            .clone()
            .unwrap_or_else(|| default_workspace.into());
        Self {
            settings,
            workspace,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Produce one task. Never fails.
    pub fn generate(&self, state: &ManifestState, now: DateTime<Utc>) -> (Task, GenerationRule) {
        let (task, rule) = self
            .missing_structure(now)
            .or_else(|| self.stale_refresh(state, now))
            .or_else(|| self.consolidation(state, now))
            .or_else(|| self.topic_deepening(state, now))
            .unwrap_or_else(|| self.strategic_planning(state, now));
        info!("Generated task via {}: {}", rule, task.text);
        (task.with_source(rule.source()).with_tags(["generated"]), rule)
    }

    fn missing_structure(&self, now: DateTime<Utc>) -> Option<(Task, GenerationRule)> {
        let missing = self
            .settings
            .required_paths
            .iter()
            .find(|p| !staleness::resolve(&self.workspace, p).exists())?;
        let task = Task::new(format!("Restore missing required path: {}", missing), now)
            .with_category(Category::Survival)
            .with_impact(Impact::Critical)
            .with_priority(1)
            .with_context(format!(
                "Expected {} under {}",
                missing,
                self.workspace.display()
            ))
            .blocking();
        Some((task, GenerationRule::MissingStructure))
    }

    fn stale_refresh(&self, state: &ManifestState, now: DateTime<Utc>) -> Option<(Task, GenerationRule)> {
        let stale = staleness::stale_artifacts(state, &self.workspace, &self.settings, now);
        if stale.len() <= self.settings.stale_threshold {
            return None;
        }
        let text = format!(
            "Refresh {} stale memory artifacts ({})",
            stale.len(),
            now.date_naive()
        );
        if state.completed_signatures.contains(&signature_of(&text)) {
            return None;
        }
        let task = Task::new(text, now)
            .with_category(Category::Memory)
            .with_impact(Impact::High)
            .with_priority(2)
            .with_context(format!(
                "Not modified in {}+ days: {}",
                self.settings.stale_days,
                sample(stale.iter().map(String::as_str))
            ));
        Some((task, GenerationRule::StaleArtifacts))
    }

    fn consolidation(&self, state: &ManifestState, now: DateTime<Utc>) -> Option<(Task, GenerationRule)> {
        let recent = staleness::recent_modifications(&self.workspace, &self.settings, now);
        if recent.len() < self.settings.burst_threshold {
            return None;
        }
        let text = format!(
            "Consolidate {} recently modified memory files ({})",
            recent.len(),
            now.date_naive()
        );
        if state.completed_signatures.contains(&signature_of(&text)) {
            return None;
        }
        let names: Vec<String> = recent
            .iter()
            .map(|p| {
                p.strip_prefix(&self.workspace)
                    .unwrap_or(p)
                    .display()
                    .to_string()
            })
            .collect();
        let task = Task::new(text, now)
            .with_category(Category::Memory)
            .with_impact(Impact::Medium)
            .with_priority(2)
            .with_context(format!(
                "Modified in the last {}h: {}",
                self.settings.burst_window_hours,
                sample(names.iter().map(String::as_str))
            ));
        Some((task, GenerationRule::ModificationBurst))
    }

    fn topic_deepening(&self, state: &ManifestState, now: DateTime<Utc>) -> Option<(Task, GenerationRule)> {
        let topic = state
            .recent_topics
            .iter()
            .rev()
            .find(|t| !t.trim().is_empty())?;
        let task = Task::new(format!("Deepen understanding of {}", topic.trim()), now)
            .with_category(Category::Expansion)
            .with_impact(Impact::Medium)
            .with_context("Most recent topic of conversation");
        if state.completed_signatures.contains(&task.signature()) {
            return None;
        }
        Some((task, GenerationRule::RecentTopic))
    }

    fn strategic_planning(&self, state: &ManifestState, now: DateTime<Utc>) -> (Task, GenerationRule) {
        // Numbered past any planning session already completed today
        let base = format!("Strategic planning: review goals and seed the queue ({})", now.date_naive());
        let text = std::iter::once(base.clone())
            .chain((2..).map(|n: u32| format!("{} #{}", base, n)))
            .find(|text| !state.completed_signatures.contains(&signature_of(text)))
            .unwrap_or(base);
        let task = Task::new(text, now)
            .with_category(Category::Expansion)
            .with_impact(Impact::Medium)
            .with_context("Queue was empty and no structural or memory signal fired");
        (task, GenerationRule::StrategicPlanning)
    }
}

fn sample<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let items: Vec<&str> = items.collect();
    let mut out = items
        .iter()
        .take(CONTEXT_SAMPLE)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > CONTEXT_SAMPLE {
        out.push_str(&format!(" (+{} more)", items.len() - CONTEXT_SAMPLE));
    }
    out
}
