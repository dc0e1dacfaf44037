// Command-line surface
//
// Thin layer over the scheduler and the artifact store: parse arguments,
// run one transition, print the result to stdout.

pub mod commands;
mod render;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::scheduling::AbandonTarget;
use crate::state::{ArtifactType, Category, Impact};

pub use commands::run;

#[derive(Debug, Parser)]
#[command(name = "cairn")]
#[command(about = "Self-directed task scheduling and memory weighting for an autonomous agent")]
#[command(version)]
pub struct Cli {
    /// State document (default: $CAIRN_HOME/manifest.json or ~/.cairn/manifest.json)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Tunables file (default: config.toml in the cairn home directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a fresh state document
    Init,

    /// Show the active task and its score breakdown
    Next,

    /// Finish the active task and promote (or generate) the next one
    Complete,

    /// Queue a new task
    Add {
        text: String,

        #[arg(long, default_value = "")]
        context: String,

        /// Tie-break only; lower wins
        #[arg(long)]
        priority: Option<i32>,

        /// Inferred from the text when omitted
        #[arg(long)]
        category: Option<Category>,

        #[arg(long)]
        impact: Option<Impact>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        blocks_others: bool,

        /// Prerequisite task id or text (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },

    /// Show the queue in selection order
    List,

    /// Show the full per-signal breakdown for every queued task
    Score,

    /// Drop the active task, a queued task (1-based index) or every stale task
    Abandon {
        /// `active`, a queue index, or `all-stale`
        target: AbandonTarget,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Register (or re-register) a memory artifact
    Track {
        path: String,

        #[arg(long = "type", default_value = "topic")]
        kind: ArtifactType,

        #[arg(long, default_value_t = 0.5)]
        weight: f64,

        /// Per-artifact decay multiplier (default: 0 for core, 1 otherwise)
        #[arg(long)]
        decay_rate: Option<f64>,

        #[arg(long, default_value = "")]
        summary: String,
    },

    /// Record an access to a tracked artifact
    Touch { path: String },

    /// Run the daily weight decay pass
    Decay,

    /// Print the wake-up context: top artifacts by effective weight
    Boot,

    /// Show recent session history
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}
