// Cairn - self-directed task scheduling for an autonomous agent
// Library exports

pub mod agent;
pub mod cli;
pub mod config;
pub mod logging;
pub mod memory;
pub mod scheduling;
pub mod state;

pub use config::Settings;
pub use scheduling::{AbandonTarget, Scheduler, SchedulerError};
pub use state::{JsonFileStore, ManifestState, StateStore, StoreError, Task};
