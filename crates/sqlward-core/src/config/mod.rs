//! Configuration types for sqlward.
//!
//! A single `SqlwardConfig` describes the datastore connection, the cache in
//! front of it and the log level. Configuration is normally loaded from a
//! YAML file:
//!
//! ```yaml
//! database:
//!   host: localhost
//!   name: shop
//!   password_env: SHOP_DB_PASSWORD
//! cache:
//!   socket_path: /run/redis/redis.sock
//!   ttl:
//!     data: 30
//! logging:
//!   level: debug
//! ```

pub mod cache;
pub mod database;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use cache::{CacheBackend, CacheCategory, CacheConfig, TtlPolicy};
pub use database::DatabaseConfig;

/// Complete sqlward configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlwardConfig {
    /// Project name, informational only.
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqlwardConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Label used as the second segment of every cache key.
    pub fn store_label(&self) -> String {
        self.cache.resolved_store_label(&self.database.name)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        let namespace = self.cache.namespace.trim();
        if namespace.is_empty() {
            return Err(ConfigError::Config(
                "cache.namespace must not be empty".to_string(),
            ));
        }
        if namespace.contains(':') || namespace.contains('*') {
            return Err(ConfigError::Config(format!(
                "cache.namespace '{}' must not contain ':' or '*'",
                namespace
            )));
        }

        if let Some(label) = &self.cache.store_label {
            if label.contains(':') || label.contains('*') {
                return Err(ConfigError::Config(format!(
                    "cache.store_label '{}' must not contain ':' or '*'",
                    label
                )));
            }
        }

        Ok(())
    }
}
