//! # Logging System
//!
//! The crate logs through the `log` facade. Embedders that do not bring their
//! own logger can install `env_logger` configured from a [`LogConfig`].

pub mod config;

pub use config::{ConfigError, LogConfig};

use once_cell::sync::OnceCell;

/// Configuration the logger was installed with
static LOGGING_CONFIG: OnceCell<LogConfig> = OnceCell::new();

pub struct LoggingSystem;

impl LoggingSystem {
    /// Initialize the logging system with default configuration
    pub fn init_default() -> Result<(), LoggingError> {
        Self::init_with_config(LogConfig::default())
    }

    /// Initialize the logging system with a custom configuration
    pub fn init_with_config(config: LogConfig) -> Result<(), LoggingError> {
        let level = config.level_filter()?;
        let features = config.feature_filters()?;

        let mut builder = env_logger::Builder::new();
        builder.filter_level(level);
        for (module, filter) in &features {
            builder.filter_module(module, *filter);
        }

        if LOGGING_CONFIG.get().is_some() {
            return Err(LoggingError::AlreadyInitialized);
        }
        builder
            .try_init()
            .map_err(|e| LoggingError::Install(e.to_string()))?;
        LOGGING_CONFIG
            .set(config)
            .map_err(|_| LoggingError::AlreadyInitialized)
    }

    /// Get the configuration the logger was installed with
    pub fn config() -> Option<&'static LogConfig> {
        LOGGING_CONFIG.get()
    }
}

/// Logging system errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logging system already initialized")]
    AlreadyInitialized,
    #[error("Failed to install logger: {0}")]
    Install(String),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
}
