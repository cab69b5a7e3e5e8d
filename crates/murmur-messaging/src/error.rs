//! Error types for murmur-messaging

use murmur_core::{BlobError, IdentityError, StoreError};
use thiserror::Error;

/// A stored record does not satisfy the required-field contract
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// A required field is absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field is present with the wrong JSON type
    #[error("invalid field {field}: expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// The date string matches no known format
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Location content is not `<longitude>,<latitude>`
    #[error("invalid location content: {0}")]
    InvalidLocation(String),

    /// Photo/video content is not an absolute URL
    #[error("invalid media url: {0}")]
    InvalidUrl(String),

    /// The value at a path does not have the expected shape
    #[error("unexpected shape at {path}: {reason}")]
    Shape { path: String, reason: String },
}

/// Errors that can occur in the conversation engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No record exists for the user
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// No message list or summary exists for the conversation
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// The target has no conversation with the caller
    #[error("no existing conversation with {0}")]
    NoExistingConversation(String),

    /// A stored record could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Caller identity is missing or malformed
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Media upload failed
    #[error("upload error: {0}")]
    Upload(#[from] BlobError),

    /// Optimistic writes kept conflicting with other writers
    #[error("gave up on {path} after {attempts} conflicting attempts")]
    ConflictRetriesExhausted { path: String, attempts: u32 },

    /// Some fan-out writes committed and others did not
    #[error("partial failure: committed {committed:?}, failed {failed}")]
    PartialFailure {
        committed: Vec<String>,
        failed: Box<SyncError>,
    },

    /// Serialization failed
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl SyncError {
    /// Whether the error means the store had no data for the request
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_) | Self::ConversationNotFound(_) | Self::NoExistingConversation(_)
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for engine operations
pub type SyncResult<T> = Result<T, SyncError>;
