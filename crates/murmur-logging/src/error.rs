//! Error types for subscriber initialization

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level {0:?}")]
    InvalidLevel(String),

    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create rolling appender: {0}")]
    Appender(String),

    #[error("global subscriber already set: {0}")]
    AlreadyInitialized(String),
}
