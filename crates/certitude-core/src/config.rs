//! Framework configuration.
//!
//! Resolution order: defaults → optional TOML file → `CERTITUDE_*`
//! environment variables. Binaries apply their own flags last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::RetryPolicy;

pub const ENV_LOG_DIR: &str = "CERTITUDE_LOG_DIR";
pub const ENV_MAX_RETRIES: &str = "CERTITUDE_MAX_RETRIES";
pub const ENV_RETRY_DELAY_MS: &str = "CERTITUDE_RETRY_DELAY_MS";
pub const ENV_GENERATOR_TIMEOUT_MS: &str = "CERTITUDE_GENERATOR_TIMEOUT_MS";
pub const ENV_SOURCE: &str = "CERTITUDE_SOURCE";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },

    #[error("max_retries must be at least 1")]
    ZeroRetries,
}

/// Framework-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Directory for the JSON-lines audit logs
    pub log_dir: PathBuf,
    /// Attempts per operation
    pub max_retries: u32,
    /// Backoff base in milliseconds
    pub retry_delay_ms: u64,
    /// Per-call generator timeout in milliseconds; `0` disables it
    pub generator_timeout_ms: u64,
    /// Audit attribution when a call names no source
    pub default_source: String,
    /// Mirror audit records as tracing events
    pub console_echo: bool,
    /// Phrases appended to the default uncertainty keywords
    pub extra_keywords: Vec<String>,
    /// Application records inspected for the recent success rate
    pub recent_window: usize,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            max_retries: 3,
            retry_delay_ms: 1_000,
            generator_timeout_ms: 120_000,
            default_source: crate::confidence_gate::DEFAULT_SOURCE.to_string(),
            console_echo: true,
            extra_keywords: Vec::new(),
            recent_window: 100,
        }
    }
}

impl FrameworkConfig {
    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Defaults, then `path` if given, then the process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CERTITUDE_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_MAX_RETRIES) {
            self.max_retries = parse_env(ENV_MAX_RETRIES, value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_DELAY_MS) {
            self.retry_delay_ms = parse_env(ENV_RETRY_DELAY_MS, value)?;
        }
        if let Some(value) = lookup(ENV_GENERATOR_TIMEOUT_MS) {
            self.generator_timeout_ms = parse_env(ENV_GENERATOR_TIMEOUT_MS, value)?;
        }
        if let Some(source) = lookup(ENV_SOURCE) {
            self.default_source = source;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            generator_timeout: (self.generator_timeout_ms > 0)
                .then(|| Duration::from_millis(self.generator_timeout_ms)),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}
