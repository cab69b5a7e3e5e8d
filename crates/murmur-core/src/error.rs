//! Error types for Murmur core

use thiserror::Error;

/// Errors related to user identities and storage keys
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Email address is missing")]
    MissingEmail,

    #[error("Display name is missing")]
    MissingDisplayName,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Email address already contains the key separator: {0}")]
    AmbiguousEmail(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Errors returned by a remote tree store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Failed to fetch {path}: {reason}")]
    FetchFailed { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Version conflict at {path}")]
    VersionConflict { path: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create a fetch failure for a path
    pub fn fetch_failed(path: impl ToString, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a write failure for a path
    pub fn write_failed(path: impl ToString, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Errors returned by a blob uploader
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    #[error("Failed to upload {filename}: {reason}")]
    UploadFailed { filename: String, reason: String },

    #[error("Download URL unavailable for {0}")]
    UrlUnavailable(String),
}
