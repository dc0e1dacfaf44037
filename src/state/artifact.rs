// Tracked knowledge artifacts

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of knowledge an artifact holds.
///
/// Only `Core` changes the weight math: it gets the importance multiplier and
/// the higher decay floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Core,
    Recent,
    Topic,
    People,
    Digest,
    Draft,
    Config,
}

impl ArtifactType {
    pub const ALL: [ArtifactType; 7] = [
        ArtifactType::Core,
        ArtifactType::Recent,
        ArtifactType::Topic,
        ArtifactType::People,
        ArtifactType::Digest,
        ArtifactType::Draft,
        ArtifactType::Config,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactType::Core => "core",
            ArtifactType::Recent => "recent",
            ArtifactType::Topic => "topic",
            ArtifactType::People => "people",
            ArtifactType::Digest => "digest",
            ArtifactType::Draft => "draft",
            ArtifactType::Config => "config",
        }
    }

    pub fn is_core(self) -> bool {
        self == ArtifactType::Core
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ArtifactType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("unknown artifact type '{}'", s))
    }
}

/// A unit of persisted agent knowledge, keyed by path in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedArtifact {
    /// Raw importance in [0, 1]; lowered by the decay pass.
    pub base_weight: f64,

    #[serde(rename = "type")]
    pub kind: ArtifactType,

    pub last_access: NaiveDate,

    #[serde(default)]
    pub access_count: u64,

    /// Per-artifact decay multiplier. Zero disables recency decay entirely.
    #[serde(default)]
    pub decay_rate: f64,

    #[serde(default)]
    pub summary: String,

    /// Explicitly archived in the manifest itself; never reported stale.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub archived: bool,
}

impl TrackedArtifact {
    pub fn new(kind: ArtifactType, base_weight: f64, today: NaiveDate) -> Self {
        Self {
            base_weight: base_weight.clamp(0.0, 1.0),
            kind,
            last_access: today,
            access_count: 0,
            decay_rate: if kind.is_core() { 0.0 } else { 1.0 },
            summary: String::new(),
            archived: false,
        }
    }

    /// Whole days since the last recorded access (never negative).
    pub fn days_since_access(&self, today: NaiveDate) -> i64 {
        (today - self.last_access).num_days().max(0)
    }

    pub fn record_access(&mut self, today: NaiveDate) {
        self.access_count += 1;
        if today > self.last_access {
            self.last_access = today;
        }
    }
}
