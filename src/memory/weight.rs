// Artifact weight model
//
//   effective = base × recency × frequency × importance
//
//   recency    = max(floor, 1 − days_since_access × decay_rate)
//   frequency  = log10(access_count + 1) + 1
//   importance = core_multiplier for core artifacts, else 1.0
//
// Core artifacts never rank below `min_core_weight`, whatever the decay.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::WeightSettings;
use crate::state::{ArtifactType, ManifestState, StateConfig, TrackedArtifact};

/// The three multipliers behind an effective weight, for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBreakdown {
    pub base: f64,
    pub recency: f64,
    pub frequency: f64,
    pub importance: f64,
    pub effective: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct WeightModel {
    recency_floor: f64,
    core_multiplier: f64,
    min_core_weight: f64,
}

impl WeightModel {
    pub fn new(settings: &WeightSettings, config: &StateConfig) -> Self {
        Self {
            recency_floor: settings.recency_floor,
            core_multiplier: settings.core_multiplier,
            min_core_weight: config.min_core_weight,
        }
    }

    pub fn recency_boost(&self, artifact: &TrackedArtifact, today: NaiveDate) -> f64 {
        let days = artifact.days_since_access(today) as f64;
        (1.0 - days * artifact.decay_rate).max(self.recency_floor)
    }

    pub fn frequency_boost(access_count: u64) -> f64 {
        (access_count as f64 + 1.0).log10() + 1.0
    }

    pub fn importance_flag(&self, kind: ArtifactType) -> f64 {
        if kind.is_core() {
            self.core_multiplier
        } else {
            1.0
        }
    }

    pub fn breakdown(&self, artifact: &TrackedArtifact, today: NaiveDate) -> WeightBreakdown {
        let recency = self.recency_boost(artifact, today);
        let frequency = Self::frequency_boost(artifact.access_count);
        let importance = self.importance_flag(artifact.kind);
        let mut effective = artifact.base_weight * recency * frequency * importance;
        if artifact.kind.is_core() {
            effective = effective.max(self.min_core_weight);
        }
        WeightBreakdown {
            base: artifact.base_weight,
            recency,
            frequency,
            importance,
            effective,
        }
    }

    pub fn effective_weight(&self, artifact: &TrackedArtifact, today: NaiveDate) -> f64 {
        self.breakdown(artifact, today).effective
    }
}

/// What a decay pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecayReport {
    /// The pass already ran today; nothing changed.
    pub already_ran: bool,
    pub decayed: usize,
    /// Artifacts that hit their type floor.
    pub floored: usize,
}

/// Lower the base weight of every artifact not touched this cycle.
///
/// `weight -= days_since_access × weight_decay_per_day × decay_rate`, clamped
/// to the type floor. Core artifacts are also raised to `min_core_weight` if a
/// hand edit left them below it. Runs at most once per calendar day.
pub fn apply_decay(
    state: &mut ManifestState,
    today: NaiveDate,
    touched: &BTreeSet<String>,
) -> DecayReport {
    if state.last_decay_run == Some(today) {
        debug!("Decay already ran on {}", today);
        return DecayReport {
            already_ran: true,
            ..Default::default()
        };
    }

    let config = state.config.clone();
    let mut report = DecayReport::default();

    for (path, artifact) in state.artifacts.iter_mut() {
        let floor = config.floor_for(artifact.kind);
        if touched.contains(path) {
            if artifact.base_weight < floor {
                artifact.base_weight = floor;
                report.floored += 1;
            }
            continue;
        }

        let days = artifact.days_since_access(today) as f64;
        let delta = days * config.weight_decay_per_day * artifact.decay_rate;
        let decayed = (artifact.base_weight - delta).min(1.0);

        if decayed <= floor {
            if artifact.base_weight != floor {
                report.floored += 1;
            }
            artifact.base_weight = floor;
        } else {
            artifact.base_weight = decayed;
        }
        if delta > 0.0 {
            report.decayed += 1;
        }
    }

    state.last_decay_run = Some(today);
    info!(
        "Decay pass on {}: {} decayed, {} at floor",
        today, report.decayed, report.floored
    );
    report
}
