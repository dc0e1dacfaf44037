// Configuration loader
// Loads tunables from ~/.cairn/config.toml (or $CAIRN_HOME/config.toml)

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::{CONFIG_FILE_NAME, DEFAULT_HOME_DIR, HOME_ENV_VAR, STATE_FILE_NAME};
use super::settings::Settings;

/// Resolve the cairn home directory: $CAIRN_HOME, else ~/.cairn
pub fn resolve_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV_VAR) {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(DEFAULT_HOME_DIR))
}

/// Default location of the state document
pub fn default_state_path() -> Result<PathBuf> {
    Ok(resolve_home()?.join(STATE_FILE_NAME))
}

/// Load settings.
///
/// An explicit path must exist. Without one, the default location is tried
/// and a missing file yields the built-in defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let settings = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file not found: {}", path.display());
            }
            parse_file(path)?
        }
        None => {
            let path = resolve_home()?.join(CONFIG_FILE_NAME);
            if path.exists() {
                parse_file(&path)?
            } else {
                tracing::debug!("No config at {}, using defaults", path.display());
                Settings::default()
            }
        }
    };

    settings
        .validate()
        .context("Configuration validation failed")?;

    Ok(settings)
}

fn parse_file(path: &Path) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let settings: Settings = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(settings)
}
