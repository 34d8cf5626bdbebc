//! Configuration management.
//!
//! Layered configuration loaded from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the
//! pattern `LINKAUDIT__<section>__<key>`:
//!
//! - `LINKAUDIT__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `LINKAUDIT__CHECKER__SLOW_THRESHOLD=4s`
//! - `LINKAUDIT__WORKER__COUNT=16`
//!
//! By default the configuration file is `config/linkaudit.toml`; override
//! with the `LINKAUDIT_CONFIG` environment variable. The Safe Browsing API
//! key is a secret and only read from `SAFEBROWSING_API_KEY` (or
//! `GOOGLE_API_KEY`), never from the file.

mod models;
mod sources;
mod validation;

pub use models::{
    ApiLimits, CheckerConfig, Config, RetentionConfig, SafeBrowsingConfig, ServerConfig,
    WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
