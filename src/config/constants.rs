// Project-wide constants
//
// Centralised here so file names and environment variables have one
// source of truth. Import via `use crate::config::constants::*;`.

/// Directory under $HOME holding the state document and config.
pub const DEFAULT_HOME_DIR: &str = ".cairn";

/// Overrides the home directory entirely (state, config, graveyard).
pub const HOME_ENV_VAR: &str = "CAIRN_HOME";

/// The single persisted state document.
pub const STATE_FILE_NAME: &str = "manifest.json";

/// Tunables file, optional.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Append-only audit log of abandoned tasks, kept next to the state document.
pub const GRAVEYARD_FILE_NAME: &str = "graveyard.jsonl";

/// Log filter used when RUST_LOG is unset.
pub const DEFAULT_LOG_FILTER: &str = "cairn=info";
