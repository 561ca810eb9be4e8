//! Configuration loading for the stow CLI.
//!
//! Configuration is loaded from a TOML file (default: `stow.toml`). A
//! missing file means all defaults; every field is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stow_client::{CacheConfig, StaleTime};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Pets API configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Query cache configuration.
    #[serde(default)]
    pub cache: CacheSection,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Pets API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the pets API (default: http://pets-v2.dev-apis.com).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Query cache configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSection {
    /// Seconds before resolved data goes stale (absent = never).
    pub stale_time_secs: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default tracing filter, overridden by `RUST_LOG` (default: info).
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_base_url() -> String {
    "http://pets-v2.dev-apis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CacheSection {
    /// Cache configuration for the query caches.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new().with_stale_time(StaleTime::from_secs(self.stale_time_secs))
    }
}

impl Config {
    /// Read `path`, or use defaults when there is no such file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Problems with the stow config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid stow TOML.
    #[error("{} is not a valid stow config", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
