//! Configuration types for the logging system

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level (overridden by RUST_LOG)
    pub default_level: String,

    /// Console output configuration
    pub console: ConsoleConfig,

    /// File output configuration
    pub file: Option<FileConfig>,

    /// JSONL output configuration
    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// Verbose, human-readable console output
    pub fn development() -> Self {
        Self {
            default_level: "debug".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
                level: Some("debug".to_string()),
            },
            ..Default::default()
        }
    }

    /// JSONL to daily rotated files, console off
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig {
                enabled: false,
                pretty: false,
                ansi: false,
                level: None,
            },
            file: Some(FileConfig {
                directory: log_dir,
                ..FileConfig::default()
            }),
            jsonl: JsonlConfig::default(),
        }
    }

    /// Warnings only, plain console
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: false,
                ansi: false,
                level: Some("warn".to_string()),
            },
            ..Default::default()
        }
    }
}

/// Console output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Enable console output
    pub enabled: bool,
    /// Use pretty (human-readable) format instead of JSONL
    pub pretty: bool,
    /// Include ANSI colors
    pub ansi: bool,
    /// Maximum level for console output, on top of the global filter
    pub level: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false, // JSONL by default
            ansi: false,
            level: None,
        }
    }
}

/// File output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Directory for log files
    pub directory: PathBuf,
    /// File name prefix
    pub prefix: String,
    /// Rotation strategy
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "murmur".to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Rotate daily
    #[default]
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate; the file is truncated at startup
    Never,
}

/// JSONL formatting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Flatten event fields to root level
    pub flatten_events: bool,
    /// Include span list in events
    pub include_spans: bool,
    /// Include file/line information
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_location: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.default_level, "info");
        assert!(config.console.enabled);
        assert!(!config.console.pretty);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert_eq!(config.default_level, "debug");
        assert!(config.console.pretty);
        assert!(config.console.ansi);
    }

    #[test]
    fn test_production_config() {
        let config = LogConfig::production(PathBuf::from("/var/log/murmur"));
        assert!(!config.console.enabled);

        let file = config.file.unwrap();
        assert_eq!(file.directory, PathBuf::from("/var/log/murmur"));
        assert_eq!(file.prefix, "murmur");
        assert_eq!(file.rotation, RotationStrategy::Daily);
    }

    #[test]
    fn test_testing_config() {
        let config = LogConfig::testing();
        assert_eq!(config.default_level, "warn");
        assert_eq!(config.console.level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: LogConfig = serde_json::from_str(
            r#"{"default_level": "trace", "file": {"rotation": "hourly"}}"#,
        )
        .unwrap();
        assert_eq!(config.default_level, "trace");
        assert_eq!(config.jsonl, JsonlConfig::default());

        let file = config.file.unwrap();
        assert_eq!(file.rotation, RotationStrategy::Hourly);
        assert_eq!(file.prefix, "murmur");
    }
}
