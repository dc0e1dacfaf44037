// Configuration structs
//
// Every field has a default so a partial (or absent) config.toml works.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::state::{Category, StateConfig};

/// Top-level tunables loaded from config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub abandon: AbandonSettings,
    #[serde(default)]
    pub generator: GeneratorSettings,
    #[serde(default)]
    pub weight: WeightSettings,
}

/// Weights of the five priority signals. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub urgency: f64,
    pub impact: f64,
    pub dependencies: f64,
    pub skip_decay: f64,
    pub blocker: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            urgency: 0.25,
            impact: 0.35,
            dependencies: 0.15,
            skip_decay: 0.15,
            blocker: 0.10,
        }
    }
}

impl SignalWeights {
    pub fn total(&self) -> f64 {
        self.urgency + self.impact + self.dependencies + self.skip_decay + self.blocker
    }
}

/// Per-category importance, highest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub survival: f64,
    pub memory: f64,
    pub infrastructure: f64,
    pub expansion: f64,
    pub research: f64,
    pub maintenance: f64,
    #[serde(rename = "nice-to-have", alias = "nice_to_have")]
    pub nice_to_have: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            survival: 1.0,
            memory: 0.9,
            infrastructure: 0.8,
            expansion: 0.6,
            research: 0.5,
            maintenance: 0.3,
            nice_to_have: 0.2,
        }
    }
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Survival => self.survival,
            Category::Memory => self.memory,
            Category::Infrastructure => self.infrastructure,
            Category::Expansion => self.expansion,
            Category::Research => self.research,
            Category::Maintenance => self.maintenance,
            Category::NiceToHave => self.nice_to_have,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub weights: SignalWeights,
    pub category_weights: CategoryWeights,

    /// Age at which urgency reaches 0.5
    pub urgency_midpoint_hours: f64,
    /// Sigmoid scale; 18h puts a one-week-old task above 0.98
    pub urgency_steepness_hours: f64,

    /// Recently finished tasks are excluded from selection for this long
    pub history_lookback_days: i64,

    /// Category rotation: look at this many most recent history entries...
    pub rotation_window: usize,
    /// ...and penalise a category appearing at least this many times in them
    pub rotation_threshold: usize,
    /// Fraction taken off the score of the dominant category (0 = off)
    pub rotation_penalty: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            category_weights: CategoryWeights::default(),
            urgency_midpoint_hours: 96.0,
            urgency_steepness_hours: 18.0,
            history_lookback_days: 7,
            rotation_window: 3,
            rotation_threshold: 3,
            rotation_penalty: 0.5,
        }
    }
}

/// Rules for the `all-stale` batch abandon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbandonSettings {
    pub stale_age_hours: f64,
    /// Skip count must be strictly greater than this
    pub stale_min_skips: u32,
    pub stale_categories: Vec<Category>,
}

impl Default for AbandonSettings {
    fn default() -> Self {
        Self {
            stale_age_hours: 168.0,
            stale_min_skips: 5,
            stale_categories: vec![
                Category::Maintenance,
                Category::NiceToHave,
                Category::Research,
            ],
        }
    }
}

/// Inputs for the fallback task generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Root that artifact paths and required paths are relative to.
    /// Defaults to the directory holding the state document.
    pub workspace: Option<PathBuf>,
    /// Paths that must exist under the workspace
    pub required_paths: Vec<String>,
    /// Directory scanned for modification bursts
    pub memory_dir: String,
    pub stale_days: i64,
    /// More than this many stale artifacts triggers a refresh task
    pub stale_threshold: usize,
    pub burst_window_hours: i64,
    /// At least this many recent modifications triggers consolidation
    pub burst_threshold: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            workspace: None,
            required_paths: vec!["memory".to_string()],
            memory_dir: "memory".to_string(),
            stale_days: 30,
            stale_threshold: 5,
            burst_window_hours: 24,
            burst_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightSettings {
    /// Lowest value the recency boost can reach
    pub recency_floor: f64,
    /// Importance multiplier for core artifacts
    pub core_multiplier: f64,
}

impl Default for WeightSettings {
    fn default() -> Self {
        Self {
            recency_floor: 0.1,
            core_multiplier: 1.5,
        }
    }
}

impl Settings {
    /// Reject configurations the scheduler cannot honour
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        let total = s.weights.total();
        if (total - 1.0).abs() > 1e-6 {
            bail!("scoring.weights must sum to 1.0 (got {:.6})", total);
        }
        for (name, w) in [
            ("urgency", s.weights.urgency),
            ("impact", s.weights.impact),
            ("dependencies", s.weights.dependencies),
            ("skip_decay", s.weights.skip_decay),
            ("blocker", s.weights.blocker),
        ] {
            if w < 0.0 {
                bail!("scoring.weights.{} must not be negative", name);
            }
        }

        let ordered: Vec<f64> = Category::ALL
            .iter()
            .map(|c| s.category_weights.get(*c))
            .collect();
        if ordered.windows(2).any(|w| w[0] <= w[1]) {
            bail!(
                "scoring.category_weights must be ordered survival > memory > infrastructure > \
                 expansion > research > maintenance > nice-to-have"
            );
        }
        if ordered.iter().any(|w| !(0.0..=1.0).contains(w)) {
            bail!("scoring.category_weights must lie in [0, 1]");
        }

        if s.urgency_steepness_hours <= 0.0 {
            bail!("scoring.urgency_steepness_hours must be positive");
        }
        if s.rotation_window == 0 {
            bail!("scoring.rotation_window must be at least 1");
        }
        if s.rotation_threshold == 0 || s.rotation_threshold > s.rotation_window {
            bail!("scoring.rotation_threshold must be between 1 and rotation_window");
        }
        if !(0.0..=1.0).contains(&s.rotation_penalty) {
            bail!("scoring.rotation_penalty must lie in [0, 1]");
        }

        if self.weight.recency_floor < 0.0 || self.weight.recency_floor > 1.0 {
            bail!("weight.recency_floor must lie in [0, 1]");
        }
        if self.weight.core_multiplier < 1.0 {
            bail!("weight.core_multiplier must be at least 1.0");
        }
        Ok(())
    }
}

/// Sanity-check the config block persisted inside the state document
pub fn validate_state_config(config: &StateConfig) -> Result<()> {
    if config.max_boot_files == 0 {
        bail!("config.maxBootFiles must be at least 1");
    }
    if config.weight_decay_per_day < 0.0 {
        bail!("config.weightDecayPerDay must not be negative");
    }
    if config.min_core_weight <= config.min_weight {
        bail!(
            "config.minCoreWeight ({}) must be strictly greater than config.minWeight ({})",
            config.min_core_weight,
            config.min_weight
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Settings::default().validate().unwrap();
        validate_state_config(&StateConfig::default()).unwrap();
    }

    #[test]
    fn test_signal_weights_sum_to_one() {
        assert!((SignalWeights::default().total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unbalanced_weights_rejected() {
        let mut settings = Settings::default();
        settings.scoring.weights.impact = 0.5;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_out_of_order_category_weights_rejected() {
        let mut settings = Settings::default();
        settings.scoring.category_weights.maintenance = 0.95;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_tied_category_weights_rejected() {
        let mut settings = Settings::default();
        settings.scoring.category_weights.research = settings.scoring.category_weights.expansion;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("category_weights must be ordered"));
    }

    #[test]
    fn test_rotation_threshold_bounded_by_window() {
        let mut settings = Settings::default();
        settings.scoring.rotation_threshold = 4;
        assert!(settings.validate().is_err());
        settings.scoring.rotation_window = 5;
        settings.validate().unwrap();
    }

    #[test]
    fn test_core_floor_must_exceed_general_floor() {
        let config = StateConfig {
            min_core_weight: 0.05,
            ..StateConfig::default()
        };
        assert!(validate_state_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[scoring]
rotation_penalty = 0.25

[scoring.category_weights]
nice-to-have = 0.1

[abandon]
stale_categories = ["maintenance"]
"#,
        )
        .unwrap();
        assert_eq!(settings.scoring.rotation_penalty, 0.25);
        assert_eq!(settings.scoring.rotation_window, 3);
        assert_eq!(settings.scoring.category_weights.nice_to_have, 0.1);
        assert_eq!(settings.scoring.category_weights.survival, 1.0);
        assert_eq!(settings.abandon.stale_categories, vec![Category::Maintenance]);
        assert_eq!(settings.abandon.stale_age_hours, 168.0);
        assert_eq!(settings.generator, GeneratorSettings::default());
    }
}
