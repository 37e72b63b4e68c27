//! Service configuration.
//!
//! Loaded from a TOML file so search budgets can be tuned without a rebuild.
//! Every field has a default; a missing file yields the defaults.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:8080"
//!
//! [search]
//! max_iterations = 50000
//! time_limit_ms = 5000
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "TIMETABLE_CONFIG";
pub const BIND_ENV: &str = "TIMETABLE_BIND";
const DEFAULT_CONFIG_PATH: &str = "timetable.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Effort bounds for one generation request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Placement attempts allowed per search run.
    pub max_iterations: u64,
    /// Wall-clock limit for the whole request, across all runs.
    pub time_limit_ms: u64,
    /// Runs attempted per requested option.
    pub restart_factor: usize,
    /// Run `i` is seeded with `seed + i`.
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200_000,
            time_limit_ms: 10_000,
            restart_factor: 4,
            seed: 42,
        }
    }
}

impl SearchConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`; a file that does not exist yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads from `TIMETABLE_CONFIG` (or `timetable.toml`) and applies
    /// the `TIMETABLE_BIND` override.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(path)?;
        if let Ok(bind) = std::env::var(BIND_ENV) {
            config.server.bind_address = bind;
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.search.max_iterations == 0 {
            return Err(ConfigError::Invalid("search.max_iterations must be positive".into()));
        }
        if self.search.time_limit_ms == 0 {
            return Err(ConfigError::Invalid("search.time_limit_ms must be positive".into()));
        }
        if self.search.restart_factor == 0 {
            return Err(ConfigError::Invalid("search.restart_factor must be positive".into()));
        }
        Ok(())
    }
}
