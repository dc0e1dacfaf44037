// Artifact memory: importance weights and wake-up ranking
//
// The agent keeps no memory between sessions; these weights decide which
// recorded artifacts it re-reads when it wakes. Retrieval of the content
// itself belongs to the external search service.

mod boot;
mod weight;

pub use boot::{rank_artifacts, render as render_boot, BootEntry};
pub use weight::{apply_decay, DecayReport, WeightBreakdown, WeightModel};
