// Configuration module
// Public interface for configuration loading

pub mod constants;
mod loader;
mod settings;

pub use loader::{default_state_path, load_settings, resolve_home};
pub use settings::{
    validate_state_config, AbandonSettings, CategoryWeights, GeneratorSettings, ScoringSettings,
    Settings, SignalWeights, WeightSettings,
};
