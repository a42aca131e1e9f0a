//! Configuration module
//!
//! [`DatabaseConfig`] is read from TOML:
//!
//! ```toml
//! pointer_policy = "cascade"   # or "detach"
//! pretty_snapshots = true
//!
//! [logging]
//! default_level = "INFO"
//!
//! [logging.features]
//! "fielddb::database" = "DEBUG"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::logging::{ConfigError, LogConfig};

/// What happens to foreign keys that target a key field being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerDeletePolicy {
    /// Delete the foreign keys along with their target.
    #[default]
    Cascade,
    /// Keep the foreign keys, clear their target and reset every reference.
    Detach,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub pointer_policy: PointerDeletePolicy,
    /// Indent snapshot JSON written by `Database::save`.
    pub pretty_snapshots: bool,
    pub logging: LogConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            pointer_policy: PointerDeletePolicy::Cascade,
            pretty_snapshots: true,
            logging: LogConfig::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DatabaseConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.logging.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn with_pointer_policy(mut self, policy: PointerDeletePolicy) -> Self {
        self.pointer_policy = policy;
        self
    }
}
