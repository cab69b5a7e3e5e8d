//! JSONL and console logging for Murmur
//!
//! Builds the global `tracing` subscriber from a [`LogConfig`]: JSONL or
//! pretty console output, optional rotated JSONL files, and a layer that
//! tags spans with the user they were opened for.
//!
//! # Quick Start
//!
//! ```ignore
//! use murmur_logging::{LogConfig, MurmurSubscriberBuilder};
//!
//! // JSONL to stdout
//! let _guard = MurmurSubscriberBuilder::new().init()?;
//!
//! // Pretty output while developing
//! let _guard = MurmurSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! # User Context
//!
//! ```ignore
//! use murmur_logging::UserContextGuard;
//!
//! let _guard = UserContextGuard::new(&alice);
//! // Spans opened here carry alice's storage key
//! sync.send_message(&alice, &id, bob.key(), "Bob", &message).await?;
//! ```
//!
//! Keep the returned [`WorkerGuard`] alive for as long as file output should
//! be flushed.

pub mod config;
pub mod context;
pub mod error;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::UserContextGuard;
pub use error::LoggingError;
pub use layers::{UserContextExtension, UserContextLayer, jsonl_layer};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use tracing_appender::{
    non_blocking::NonBlocking,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::LevelFilter, fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Builder for configuring and installing the Murmur logging subscriber
///
/// Console output is JSONL unless [`ConsoleConfig::pretty`] is set.
/// `RUST_LOG` takes precedence over the configured default level.
#[derive(Debug, Clone, Default)]
pub struct MurmurSubscriberBuilder {
    config: LogConfig,
}

impl MurmurSubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Switch console output between pretty and JSONL
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self.config.console.ansi = pretty;
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Returns the file writer's guard when file output is configured.
    /// Fails without installing anything if a level does not parse, the log
    /// file cannot be opened, or a global subscriber is already set.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let console = &self.config.console;
        let console_level = match &console.level {
            Some(level) => parse_level(level)?,
            None => LevelFilter::TRACE,
        };
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.config.default_level)
                .map_err(|_| LoggingError::InvalidLevel(self.config.default_level.clone()))?,
        };

        let (file_writer, guard) = match &self.config.file {
            Some(file) => {
                let (writer, guard) = file_writer(file)?;
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let pretty_console = (console.enabled && console.pretty).then(|| {
            fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_filter(console_level)
        });
        let jsonl_console = (console.enabled && !console.pretty).then(|| {
            layers::jsonl_layer(&self.config.jsonl, std::io::stdout).with_filter(console_level)
        });
        let file_layer = file_writer.map(|writer| layers::jsonl_layer(&self.config.jsonl, writer));

        Registry::default()
            .with(env_filter)
            .with(UserContextLayer::new())
            .with(pretty_console)
            .with(jsonl_console)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    level
        .parse()
        .map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

/// Open the writer for file output
///
/// `Never` truncates a single `<prefix>.log`; the rotating strategies append
/// to `<prefix>.<date>.log` files.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            fs::create_dir_all(&config.directory).map_err(|source| LoggingError::LogFile {
                path: path.clone(),
                source,
            })?;
            let file = File::create(&path).map_err(|source| LoggingError::LogFile { path, source })?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("log")
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// JSONL to the console at `info`
pub fn init_default() -> Result<Option<WorkerGuard>, LoggingError> {
    MurmurSubscriberBuilder::new().init()
}

/// Pretty console output at `debug`
pub fn init_development() -> Result<Option<WorkerGuard>, LoggingError> {
    MurmurSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Warnings only; safe to call from every test
pub fn init_testing() {
    let _ = MurmurSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
