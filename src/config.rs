//! Metrics engine configuration
//!
//! Loaded from a TOML file or from environment variables:
//!
//! - `STATE_METRICS_ALLOWLIST`: comma separated family name patterns
//! - `STATE_METRICS_DENYLIST`: comma separated family name patterns
//! - `STATE_METRICS_SHARD_HINT`: reserved shard number (default: 0, unsharded)
//! - `STATE_METRICS_LOG_LEVEL`: default log directive (default: info)
//! - `STATE_METRICS_LOG_JSON`: emit JSON logs (default: false)
//!
//! The allowlist and denylist are mutually exclusive.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::generator::{AllowDenyList, PolicyError};

/// Error loading configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Policy(PolicyError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::Policy(e) => write!(f, "invalid family filter: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Policy(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<PolicyError> for ConfigError {
    fn from(e: PolicyError) -> Self {
        ConfigError::Policy(e)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Family name patterns to keep; everything else is dropped
    pub allowlist: Vec<String>,
    /// Family name patterns to drop
    pub denylist: Vec<String>,
    /// Reserved; 0 means unsharded
    pub shard_hint: u32,
    pub log: LogConfig,
}

impl MetricsConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: MetricsConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Load configuration from environment variables
    ///
    /// Unset or unparseable variables fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = LogConfig::default();
        MetricsConfig {
            allowlist: parse_list(lookup("STATE_METRICS_ALLOWLIST")),
            denylist: parse_list(lookup("STATE_METRICS_DENYLIST")),
            shard_hint: lookup("STATE_METRICS_SHARD_HINT")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0),
            log: LogConfig {
                level: lookup("STATE_METRICS_LOG_LEVEL").unwrap_or(defaults.level),
                json: lookup("STATE_METRICS_LOG_JSON")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(defaults.json),
            },
        }
    }

    /// Check the family filter can be built
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.family_filter()?;
        Ok(())
    }

    /// Build the inclusion policy applied to generators
    pub fn family_filter(&self) -> Result<AllowDenyList, PolicyError> {
        AllowDenyList::new(&self.allowlist, &self.denylist)
    }
}

/// Parse a comma separated list, skipping blanks
fn parse_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
