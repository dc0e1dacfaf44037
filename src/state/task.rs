// Discretionary work units competing for the single active slot

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Priority given to tasks that do not declare one. Lower numbers win ties.
pub const DEFAULT_PRIORITY: i32 = 3;

/// Work category, declared in descending order of default importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Survival,
    Memory,
    Infrastructure,
    Expansion,
    Research,
    Maintenance,
    NiceToHave,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Survival,
        Category::Memory,
        Category::Infrastructure,
        Category::Expansion,
        Category::Research,
        Category::Maintenance,
        Category::NiceToHave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Survival => "survival",
            Category::Memory => "memory",
            Category::Infrastructure => "infrastructure",
            Category::Expansion => "expansion",
            Category::Research => "research",
            Category::Maintenance => "maintenance",
            Category::NiceToHave => "nice-to-have",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match key.as_str() {
            "nicetohave" | "nice" => Ok(Category::NiceToHave),
            "infra" => Ok(Category::Infrastructure),
            _ => Category::ALL
                .into_iter()
                .find(|c| c.as_str() == key)
                .ok_or_else(|| format!("unknown category '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    High,
    Medium,
    Low,
}

impl Impact {
    pub const ALL: [Impact; 4] = [Impact::Critical, Impact::High, Impact::Medium, Impact::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Impact::Critical => "critical",
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        }
    }

    /// Fixed impact multiplier used by the scorer.
    pub fn weight(self) -> f64 {
        match self {
            Impact::Critical => 1.0,
            Impact::High => 0.75,
            Impact::Medium => 0.5,
            Impact::Low => 0.25,
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Impact::ALL
            .into_iter()
            .find(|i| i.as_str() == lower)
            .ok_or_else(|| format!("unknown impact '{}'", s))
    }
}

// Precedence-ordered: the first category with a matching keyword wins, so
// generic verbs ("add", "build") sit in the last rows.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Survival,
        &[
            "backup", "backups", "restore", "broken", "crash", "crashing", "corrupt",
            "corrupted", "recover", "recovery", "outage", "security", "failing", "urgent",
            "survival",
        ],
    ),
    (
        Category::Memory,
        &[
            "memory", "memories", "remember", "consolidate", "consolidation", "notes",
            "journal", "recall", "index", "knowledge", "summarize", "summarise",
        ],
    ),
    (
        Category::Infrastructure,
        &[
            "script", "scripts", "tooling", "automation", "automate", "cron", "pipeline",
            "install", "deploy", "infrastructure", "setup", "migrate", "config",
        ],
    ),
    (
        Category::Research,
        &[
            "research", "investigate", "explore", "study", "learn", "compare", "evaluate",
            "survey", "read",
        ],
    ),
    (
        Category::Maintenance,
        &[
            "cleanup", "clean up", "tidy", "refactor", "prune", "archive", "maintenance",
            "lint", "upgrade", "dedupe", "rename",
        ],
    ),
    (
        Category::NiceToHave,
        &["someday", "maybe", "polish", "cosmetic", "nice to have", "nice-to-have"],
    ),
    (
        Category::Expansion,
        &[
            "build", "create", "implement", "add", "extend", "expand", "feature", "new",
            "write", "design",
        ],
    ),
];

static CATEGORY_PATTERNS: Lazy<Vec<(Category, Regex)>> = Lazy::new(|| {
    CATEGORY_KEYWORDS
        .iter()
        .filter_map(|(category, words)| {
            let alternation = words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
                .ok()
                .map(|re| (*category, re))
        })
        .collect()
});

/// Category used when no keyword matches.
pub const FALLBACK_CATEGORY: Category = Category::Expansion;

/// Infer a category from free text using the fixed precedence table.
pub fn infer_category(text: &str) -> Category {
    CATEGORY_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(category, _)| *category)
        .unwrap_or(FALLBACK_CATEGORY)
}

/// Normalized key for "functionally identical" task text: lowercase
/// alphanumeric words joined by single spaces.
pub fn signature_of(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A unit of discretionary work.
///
/// Deserialization goes through a lenient record so entries missing a
/// category, tags, id or timestamp are backfilled instead of rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TaskRecord")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub context: String,
    /// Tie-break only; lower wins.
    pub priority: i32,
    pub category: Category,
    pub impact: Impact,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    /// Cycles this task sat in the queue while another was promoted.
    pub skip_count: u32,
    /// Provenance: "manual", "cli", or the generator rule that produced it.
    pub source: String,
    pub blocks_others: bool,
    /// Prerequisite task ids (or task text).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Task {
    /// New queued task with the category inferred from its text.
    pub fn new(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        let text = text.into();
        let category = infer_category(&text);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tags: default_tags(category),
            text,
            context: String::new(),
            priority: DEFAULT_PRIORITY,
            category,
            impact: Impact::Medium,
            created_at: now,
            skip_count: 0,
            source: "manual".to_string(),
            blocks_others: false,
            depends_on: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self.tags = default_tags(category);
        self
    }

    pub fn with_impact(mut self, impact: Impact) -> Self {
        self.impact = impact;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn blocking(mut self) -> Self {
        self.blocks_others = true;
        self
    }

    pub fn depending_on(mut self, prerequisite: impl Into<String>) -> Self {
        self.depends_on.push(prerequisite.into());
        self
    }

    pub fn signature(&self) -> String {
        signature_of(&self.text)
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now - self.created_at).num_seconds().max(0);
        secs as f64 / 3600.0
    }
}

fn default_tags(category: Category) -> BTreeSet<String> {
    BTreeSet::from([category.as_str().to_string()])
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    tags: Option<BTreeSet<String>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    skip_count: u32,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    blocks_others: bool,
    #[serde(default)]
    depends_on: Vec<String>,
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        let category = record
            .category
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or_else(|| {
                let inferred = infer_category(&record.text);
                tracing::debug!(
                    "Backfilled category '{}' for task: {}",
                    inferred,
                    record.text
                );
                inferred
            });
        let impact = record
            .impact
            .as_deref()
            .and_then(|i| i.parse().ok())
            .unwrap_or(Impact::Medium);

        Self {
            id: record
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            context: record.context,
            priority: record.priority.unwrap_or(DEFAULT_PRIORITY),
            category,
            impact,
            tags: record.tags.unwrap_or_else(|| default_tags(category)),
            created_at: record.created_at.unwrap_or_else(Utc::now),
            skip_count: record.skip_count,
            source: record.source.unwrap_or_else(|| "manual".to_string()),
            blocks_others: record.blocks_others,
            depends_on: record.depends_on,
            text: record.text,
        }
    }
}
