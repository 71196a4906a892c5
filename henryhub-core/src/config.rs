//! Run configuration.
//!
//! Loaded from an optional TOML file, then overlaid with environment
//! variables for secrets. Every section has defaults matching the daily job,
//! so an empty file (or no file) is a valid configuration.

use crate::data::fetch::DEFAULT_PAGE_SIZE;
use crate::data::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "EIA_API_KEY";
/// Environment variable overriding the mirror URL.
pub const ENV_MIRROR_URL: &str = "HENRYHUB_MIRROR_URL";
/// Environment variable holding the push remote (may embed a token).
pub const ENV_REPO_URL: &str = "GITHUB_REPO_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryPolicy,
    pub output: OutputConfig,
    pub publish: PublishConfig,
}

/// Remote API settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Series identifier (Henry Hub daily spot is `RNGWHHD`).
    pub series: String,
    pub frequency: String,
    pub page_size: usize,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.eia.gov/v2/natural-gas/pri/fut/data/".into(),
            series: "RNGWHHD".into(),
            frequency: "daily".into(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("series", &self.series)
            .field("frequency", &self.frequency)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where the table lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    /// Read existing data from this URL instead of `path`.
    pub mirror_url: Option<String>,
    /// Append new rows instead of rewriting the file.
    pub append: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/henry_hub_prices.csv"),
            mirror_url: None,
            append: false,
        }
    }
}

/// Settings for force-pushing the updated table.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub repo_path: PathBuf,
    pub remote_url: Option<String>,
    pub branch: String,
    pub commit_message: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            remote_url: None,
            branch: "main".into(),
            commit_message: "Daily force push to update repo".into(),
        }
    }
}

impl fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishConfig")
            .field("repo_path", &self.repo_path)
            .field("remote_url", &self.remote_url.as_ref().map(|_| "<redacted>"))
            .field("branch", &self.branch)
            .field("commit_message", &self.commit_message)
            .finish()
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay secrets and overrides from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = get(ENV_API_KEY) {
            self.api.api_key = Some(key);
        }
        if let Some(url) = get(ENV_MIRROR_URL) {
            self.output.mirror_url = Some(url);
        }
        if let Some(url) = get(ENV_REPO_URL) {
            self.publish.remote_url = Some(url);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.page_size == 0 {
            return Err(ConfigError::Invalid("api.page_size must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        if self.api.series.trim().is_empty() {
            return Err(ConfigError::Invalid("api.series must not be empty".into()));
        }
        Ok(())
    }
}
