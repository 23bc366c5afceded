//! Application configuration
//!
//! One JSON document holding every tunable: analyser, prime tones, render
//! mapping, parameter persistence and logging. Missing sections fall back to
//! their defaults so partial files stay valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::audio::AnalyserConfig;
use crate::logging::LogConfig;
use crate::primes::PrimeConfig;
use crate::render::RenderSettings;
use crate::visual_params::{JsonFileParamStore, ParamOverrides};

/// Errors from loading, saving or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid configuration JSON
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Visual parameter persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsConfig {
    /// Use the persisted store
    pub persist: bool,
    /// JSON store location; `None` uses the default data directory
    pub store_path: Option<PathBuf>,
    /// Hand-tuned bundles keyed by journey
    pub overrides: ParamOverrides,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            persist: true,
            store_path: None,
            overrides: ParamOverrides::default(),
        }
    }
}

impl ParamsConfig {
    /// Effective store path
    pub fn resolved_store_path(&self) -> Option<PathBuf> {
        self.store_path
            .clone()
            .or_else(JsonFileParamStore::default_path)
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShifterConfig {
    /// Analyser node settings
    pub analyser: AnalyserConfig,
    /// Prime tone list and filter shape
    pub primes: PrimeConfig,
    /// Scene mapping and pacing
    pub render: RenderSettings,
    /// Visual parameter persistence and overrides
    pub params: ParamsConfig,
    /// Logging
    pub logging: LogConfig,
    /// Preferred output device name
    pub output_device: Option<String>,
}

impl ShifterConfig {
    /// Default location (in the user config directory)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("SacredShifter").join("config.json"))
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ShifterConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default path, or fall back to defaults.
    ///
    /// A missing file is normal. An unreadable or invalid one also yields
    /// defaults; its error is handed back so it can be reported once a
    /// subscriber is installed.
    pub fn load_or_default() -> (Self, Option<ConfigError>) {
        Self::load_or_default_from(Self::default_path().as_deref())
    }

    /// [`load_or_default`](Self::load_or_default) for an explicit location
    pub fn load_or_default_from(path: Option<&Path>) -> (Self, Option<ConfigError>) {
        match path.filter(|p| p.exists()).map(Self::load) {
            None => (Self::default(), None),
            Some(Ok(config)) => (config, None),
            Some(Err(e)) => (Self::default(), Some(e)),
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Check every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analyser.validate().map_err(ConfigError::Invalid)?;
        self.primes.validate().map_err(ConfigError::Invalid)?;
        self.render.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}
