// Artifact staleness and modification bursts
//
// Input for the task generator. Modification time alone is not enough to
// call an artifact stale: anything archived or reviewed, either in the
// manifest or in the file's own front matter, is left out.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::config::GeneratorSettings;
use crate::state::{ManifestState, TrackedArtifact};

/// Flags read from a leading `---` front-matter block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontMatterFlags {
    pub archived: bool,
    pub reviewed: bool,
}

impl FrontMatterFlags {
    pub fn parse(contents: &str) -> Self {
        let mut flags = Self::default();
        let mut lines = contents.lines();
        if lines.next().map(str::trim) != Some("---") {
            return flags;
        }
        for line in lines {
            if line.trim() == "---" {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .to_lowercase();
            match key.as_str() {
                "status" => match value.as_str() {
                    "archived" => flags.archived = true,
                    "reviewed" => flags.reviewed = true,
                    _ => {}
                },
                "archived" => flags.archived = matches!(value.as_str(), "true" | "yes"),
                "reviewed" => {
                    flags.reviewed = !value.is_empty() && !matches!(value.as_str(), "false" | "no")
                }
                _ => {}
            }
        }
        flags
    }

    /// Unreadable files count as unmarked.
    pub fn read(path: &Path) -> Self {
        fs::read_to_string(path)
            .map(|c| Self::parse(&c))
            .unwrap_or_default()
    }
}

/// Archived/reviewed in the manifest or in the file itself.
pub fn is_marked_done(artifact: &TrackedArtifact, file: &Path) -> bool {
    if artifact.archived {
        return true;
    }
    let flags = FrontMatterFlags::read(file);
    flags.archived || flags.reviewed
}

/// Resolve an artifact key against the workspace root.
pub fn resolve(workspace: &Path, artifact_path: &str) -> PathBuf {
    let p = Path::new(artifact_path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        workspace.join(p)
    }
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let modified: SystemTime = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Tracked artifacts untouched for more than `stale_days`, sorted by path.
///
/// Files missing on disk fall back to the manifest's `lastAccess` date.
pub fn stale_artifacts(
    state: &ManifestState,
    workspace: &Path,
    settings: &GeneratorSettings,
    now: DateTime<Utc>,
) -> Vec<String> {
    let cutoff = now - Duration::days(settings.stale_days);
    state
        .artifacts
        .iter()
        .filter(|(path, artifact)| {
            let file = resolve(workspace, path);
            let last_change = modified_at(&file).or_else(|| {
                artifact
                    .last_access
                    .and_hms_opt(0, 0, 0)
                    .map(|midnight| Utc.from_utc_datetime(&midnight))
            });
            last_change.is_some_and(|t| t < cutoff) && !is_marked_done(artifact, &file)
        })
        .map(|(path, _)| path.clone())
        .collect()
}

/// Files under the memory directory modified within the burst window.
pub fn recent_modifications(
    workspace: &Path,
    settings: &GeneratorSettings,
    now: DateTime<Utc>,
) -> Vec<PathBuf> {
    let root = workspace.join(&settings.memory_dir);
    if !root.is_dir() {
        return Vec::new();
    }
    let cutoff = now - Duration::hours(settings.burst_window_hours);
    let mut recent: Vec<PathBuf> = WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| modified_at(e.path()).is_some_and(|m| m >= cutoff))
        .map(|e| e.into_path())
        .collect();
    recent.sort();
    recent
}
