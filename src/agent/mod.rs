// Agent-side collaborators of the scheduler
//
// The session recorder appends history, the graveyard keeps the abandonment
// audit trail, and the generator invents work when the queue runs dry using
// the staleness and burst signals read from the workspace.

pub mod generator;
pub mod graveyard;
pub mod recorder;
pub mod staleness;

pub use generator::{GenerationRule, TaskGenerator};
pub use graveyard::{Graveyard, GraveyardEntry};
pub use recorder::{current_streak, SessionRecorder};
pub use staleness::FrontMatterFlags;
