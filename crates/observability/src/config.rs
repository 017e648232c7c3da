//! Environment-driven observability configuration.
//!
//! | env var                  | field           | default |
//! |--------------------------|-----------------|---------|
//! | `RUST_LOG`               | `filter`        | `info`  |
//! | `FORGEERP_LOG_FORMAT`    | `format`        | `json`  |
//! | `FORGEERP_LOGGED_SCOPES` | `logged_scopes` | (empty: every module) |

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const FILTER_ENV: &str = "RUST_LOG";
pub const FORMAT_ENV: &str = "FORGEERP_LOG_FORMAT";
pub const LOGGED_SCOPES_ENV: &str = "FORGEERP_LOGGED_SCOPES";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid log filter `{directive}`: {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("unknown log format `{0}` (expected json, pretty or compact)")]
    UnknownFormat(String),

    #[error("invalid logged scope `{0}`: expected a module path such as `forgeerp_services::order`")]
    InvalidScope(String),
}

/// Output format of the process-wide `fmt` layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directives, e.g. `info,forgeerp_observability::invocation=debug`.
    pub filter: String,
    pub format: LogFormat,
    /// Module path prefixes whose loggable methods are intercepted.
    /// Empty means every module is in scope.
    pub logged_scopes: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
            logged_scopes: Vec::new(),
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup (env, test fixtures).
    ///
    /// Unset or blank keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(filter) = present(FILTER_ENV) {
            config.filter = filter.trim().to_string();
        }
        if let Some(format) = present(FORMAT_ENV) {
            config.format = format.parse()?;
        }
        if let Some(scopes) = present(LOGGED_SCOPES_ENV) {
            config.logged_scopes = scopes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Check filter directives and scope paths.
    ///
    /// Deserialized configs bypass `from_lookup`, so callers loading a config
    /// file should validate before use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.env_filter()?;
        for scope in &self.logged_scopes {
            validate_scope(scope)?;
        }
        Ok(())
    }

    pub(crate) fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        EnvFilter::try_new(&self.filter).map_err(|e| ConfigError::InvalidFilter {
            directive: self.filter.clone(),
            reason: e.to_string(),
        })
    }
}

/// A scope is a `::`-separated module path with non-empty, whitespace-free segments.
pub(crate) fn validate_scope(scope: &str) -> Result<(), ConfigError> {
    let well_formed = !scope.is_empty()
        && scope
            .split("::")
            .all(|seg| !seg.is_empty() && !seg.chars().any(|c| c.is_whitespace() || c == ':'));

    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::InvalidScope(scope.to_string()))
    }
}
