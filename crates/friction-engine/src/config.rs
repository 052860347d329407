use friction_core::{WindowConfig, MAX_RETENTION_SECS};
use friction_guards::{EnvelopeError, FrictionGuards};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_HYSTERESIS: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Every tunable of the loop. Missing fields fall back to the defaults below.
///
/// Defaults: window keeps 64 samples per category over 900 s (at most one
/// year is accepted), reversal needs
/// 2 consecutive negative readings, and each category uses the
/// thresholds documented on its envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    /// Consecutive negative detections required before an adjustment is reversed (H).
    pub hysteresis: u32,
    pub guards: FrictionGuards,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            hysteresis: DEFAULT_HYSTERESIS,
            guards: FrictionGuards::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn with_hysteresis(mut self, hysteresis: u32) -> Self {
        self.hysteresis = hysteresis;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hysteresis == 0 {
            return Err(ConfigError::Invalid("hysteresis must be at least 1".into()));
        }
        if self.window.capacity_per_category == 0 {
            return Err(ConfigError::Invalid(
                "window capacity per category must be at least 1".into(),
            ));
        }
        let retention = self.window.retention_secs;
        if !(retention.is_finite() && retention > 0.0 && retention <= MAX_RETENTION_SECS) {
            return Err(ConfigError::Invalid(format!(
                "window retention must be between 0 and {MAX_RETENTION_SECS} seconds, got {retention}"
            )));
        }
        self.guards.validate()?;
        Ok(())
    }
}
