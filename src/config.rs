//! Environment configuration helpers
//!
//! Every configurable component exposes a `from_env()` constructor built on
//! these helpers. Unset variables fall back to defaults; variables that are
//! set but malformed are errors so that startup fails fast.

use std::str::FromStr;

/// Read a variable, treating empty values as unset
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a required variable
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env_string(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Parse a variable, or use `default` when it is unset
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env_string(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Parse a boolean flag (`true`/`false`/`1`/`0`/`yes`/`no`)
pub fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env_string(key) {
        Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Split a comma-separated list, dropping blank entries
pub fn env_list(key: &str) -> Option<Vec<String>> {
    env_string(key).map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required variable {0}")]
    Missing(String),

    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },

    #[error("{field}: {reason}")]
    OutOfRange { field: &'static str, reason: &'static str },

    #[error("Unknown {kind} {name:?}")]
    Unknown { kind: &'static str, name: String },

    #[error("{0} requires the `kafka` feature")]
    FeatureDisabled(String),
}
