//! Error types for murmur-storage

use murmur_core::StoreError;
use thiserror::Error;

/// Errors that can occur in storage operations outside the store contract
#[derive(Debug, Error)]
pub enum StorageError {
    /// Requested item was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The tree store rejected the operation
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = StorageError::not_found("images/x.png");
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(err.to_string().contains("images/x.png"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StorageError = json_err.into();
        assert!(matches!(err, StorageError::Deserialization(_)));
    }
}
