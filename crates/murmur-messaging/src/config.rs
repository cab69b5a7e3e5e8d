//! Configuration for the conversation engine
//!
//! [`SyncConfig::default`] uses collision-resistant ids, RFC 3339 dates and
//! conditional writes with retry. [`SyncConfig::legacy`] writes exactly what
//! older clients write and keeps their last-write-wins behavior.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::IdStrategy;
use crate::timestamp::DateFormat;

/// Errors loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Retry behavior for conflicting read-modify-write cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total write attempts; `0` disables conditional writes entirely
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(rename = "initial_backoff_ms", with = "duration_ms")]
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    #[serde(rename = "max_backoff_ms", with = "duration_ms")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    /// One read and one unconditional write, the last writer wins
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Delay before retry number `retry` (1-based), doubled each time
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub id_strategy: IdStrategy,
    pub date_format: DateFormat,
    pub retry: RetryPolicy,
    /// Path of the global user directory
    pub users_path: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            id_strategy: IdStrategy::Unique,
            date_format: DateFormat::Rfc3339,
            retry: RetryPolicy::default(),
            users_path: "users".to_string(),
        }
    }
}

impl SyncConfig {
    /// Wire-compatible with older clients, including their races
    pub fn legacy() -> Self {
        Self {
            id_strategy: IdStrategy::Legacy,
            date_format: DateFormat::Legacy,
            retry: RetryPolicy::disabled(),
            ..Default::default()
        }
    }

    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.date_format = format;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_users_path(mut self, path: impl Into<String>) -> Self {
        self.users_path = path.into();
        self
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead(e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.users_path.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid("users_path must not be empty".into()));
        }
        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(ConfigError::Invalid(
                "initial_backoff exceeds max_backoff".into(),
            ));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
