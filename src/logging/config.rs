//! Configuration for the logging system
//!
//! Loaded from the `[logging]` table of the database configuration, a
//! standalone TOML file, or environment variables.

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main logging configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level for all modules
    pub default_level: String,
    /// Module-specific log levels, keyed by module path (e.g. `fielddb::acl`)
    pub features: HashMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "INFO".to_string(),
            features: HashMap::new(),
        }
    }
}

impl LogConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;

        let mut config: LogConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `FIELDDB_LOG_LEVEL` and `FIELDDB_LOG_FEATURE_<MODULE>` overrides.
    ///
    /// Feature names are lowercased and `__` becomes `::`, so
    /// `FIELDDB_LOG_FEATURE_FIELDDB__ACL=DEBUG` targets `fielddb::acl`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("FIELDDB_LOG_LEVEL") {
            self.default_level = level;
        }

        for (key, value) in std::env::vars() {
            if let Some(feature) = key.strip_prefix("FIELDDB_LOG_FEATURE_") {
                let feature_name = feature.to_lowercase().replace("__", "::");
                self.features.insert(feature_name, value);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.level_filter()?;
        self.feature_filters()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        parse_log_level(&self.default_level)
            .ok_or_else(|| ConfigError::InvalidLevel(self.default_level.clone()))
    }

    pub fn feature_filters(&self) -> Result<Vec<(String, LevelFilter)>, ConfigError> {
        let mut filters = Vec::with_capacity(self.features.len());
        for (feature, level) in &self.features {
            let filter = parse_log_level(level)
                .ok_or_else(|| ConfigError::InvalidFeatureLevel(feature.clone(), level.clone()))?;
            filters.push((feature.clone(), filter));
        }
        filters.sort();
        Ok(filters)
    }
}

fn parse_log_level(level: &str) -> Option<LevelFilter> {
    match level.to_uppercase().as_str() {
        "TRACE" => Some(LevelFilter::Trace),
        "DEBUG" => Some(LevelFilter::Debug),
        "INFO" => Some(LevelFilter::Info),
        "WARN" => Some(LevelFilter::Warn),
        "ERROR" => Some(LevelFilter::Error),
        "OFF" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),
    #[error("Invalid log level for feature '{0}': {1}")]
    InvalidFeatureLevel(String, String),
}
