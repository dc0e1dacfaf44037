// Boot context: which artifacts are worth re-reading at wake-up

use chrono::NaiveDate;
use std::cmp::Ordering;

use super::weight::WeightModel;
use crate::state::{ArtifactType, ManifestState};

/// One artifact selected for the wake-up context.
#[derive(Debug, Clone, PartialEq)]
pub struct BootEntry {
    pub path: String,
    pub kind: ArtifactType,
    pub weight: f64,
    pub summary: String,
}

/// Rank every artifact by effective weight (descending, ties by path) and
/// keep the top `max_boot_files`.
pub fn rank_artifacts(state: &ManifestState, model: &WeightModel, today: NaiveDate) -> Vec<BootEntry> {
    let mut entries: Vec<BootEntry> = state
        .artifacts
        .iter()
        .map(|(path, artifact)| BootEntry {
            path: path.clone(),
            kind: artifact.kind,
            weight: model.effective_weight(artifact, today),
            summary: artifact.summary.clone(),
        })
        .collect();

    entries.sort_by(|a, b| match b.weight.total_cmp(&a.weight) {
        Ordering::Equal => a.path.cmp(&b.path),
        other => other,
    });
    entries.truncate(state.config.max_boot_files);
    entries
}

/// Render the boot list as a markdown block for the agent's first prompt.
pub fn render(entries: &[BootEntry]) -> String {
    if entries.is_empty() {
        return "No tracked artifacts.\n".to_string();
    }
    let mut out = String::from("## Boot context\n\n");
    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{}. `{}` [{}] weight {:.3}",
            i + 1,
            entry.path,
            entry.kind,
            entry.weight
        ));
        if !entry.summary.is_empty() {
            out.push_str(&format!(": {}", entry.summary));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightSettings;
    use crate::state::{StateConfig, TrackedArtifact};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
    }

    fn state(max_boot_files: usize, artifacts: &[(&str, ArtifactType, f64)]) -> ManifestState {
        let mut state = ManifestState::new(StateConfig {
            max_boot_files,
            ..StateConfig::default()
        });
        for (path, kind, base) in artifacts {
            let mut a = TrackedArtifact::new(*kind, *base, today());
            a.summary = format!("about {}", path);
            state.artifacts.insert(path.to_string(), a);
        }
        state
    }

    fn model(state: &ManifestState) -> WeightModel {
        WeightModel::new(&WeightSettings::default(), &state.config)
    }

    #[test]
    fn test_ranks_by_effective_weight_and_truncates() {
        let s = state(
            2,
            &[
                ("a.md", ArtifactType::Topic, 0.3),
                ("b.md", ArtifactType::Topic, 0.9),
                ("c.md", ArtifactType::Core, 0.5),
            ],
        );
        let ranked = rank_artifacts(&s, &model(&s), today());
        let paths: Vec<_> = ranked.iter().map(|e| e.path.as_str()).collect();
        // core: 0.5 × 1.5 = 0.75 < 0.9
        assert_eq!(paths, vec!["b.md", "c.md"]);
    }

    #[test]
    fn test_ties_break_by_path() {
        let s = state(
            10,
            &[
                ("zeta.md", ArtifactType::Topic, 0.4),
                ("alpha.md", ArtifactType::People, 0.4),
                ("mid.md", ArtifactType::Digest, 0.4),
            ],
        );
        let ranked = rank_artifacts(&s, &model(&s), today());
        let paths: Vec<_> = ranked.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["alpha.md", "mid.md", "zeta.md"]);
    }

    #[test]
    fn test_render_lists_entries() {
        let s = state(5, &[("core/self.md", ArtifactType::Core, 0.8)]);
        let out = render(&rank_artifacts(&s, &model(&s), today()));
        assert!(out.contains("1. `core/self.md` [core] weight 1.200"));
        assert!(out.contains("about core/self.md"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "No tracked artifacts.\n");
    }
}
