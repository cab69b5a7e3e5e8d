//! In-memory blob store
//!
//! Content-addressed by BLAKE3; objects are also indexed by the name they
//! were uploaded under so the returned URL can be fetched back.

use async_trait::async_trait;
use murmur_core::{BlobError, BlobUploader};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, instrument};
use url::Url;

use crate::error::StorageError;

/// Default base URL for uploaded objects
pub const DEFAULT_BASE_URL: &str = "memory://blobs/";

/// In-memory implementation of [`BlobUploader`]
#[derive(Debug)]
pub struct InMemoryBlobStore {
    base_url: String,
    /// Content hash (hex) -> bytes
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    /// Object name -> content hash (hex)
    names: RwLock<HashMap<String, String>>,
    /// Remaining uploads to reject
    fail_next: RwLock<usize>,
}

impl InMemoryBlobStore {
    /// Create a store serving URLs under [`DEFAULT_BASE_URL`]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a store serving URLs under `base_url`
    ///
    /// A trailing slash is added if missing.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            blobs: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
            fail_next: RwLock::new(0),
        }
    }

    /// Reject the next `count` uploads
    pub fn fail_next_uploads(&self, count: usize) {
        *self.fail_next.write() = count;
    }

    /// Fetch the bytes behind a URL this store handed out
    pub fn fetch(&self, url: &Url) -> Result<Vec<u8>, StorageError> {
        let name = url
            .as_str()
            .strip_prefix(&self.base_url)
            .ok_or_else(|| StorageError::not_found(url.as_str()))?;
        let names = self.names.read();
        let hash = names
            .get(name)
            .ok_or_else(|| StorageError::not_found(url.as_str()))?;
        self.blobs
            .read()
            .get(hash)
            .cloned()
            .ok_or_else(|| StorageError::not_found(hash.clone()))
    }

    /// Number of distinct blobs held
    pub fn blob_count(&self) -> usize {
        self.blobs.read().len()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobUploader for InMemoryBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<Url, BlobError> {
        {
            let mut fail_next = self.fail_next.write();
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(BlobError::UploadFailed {
                    filename: filename.to_string(),
                    reason: "injected fault".to_string(),
                });
            }
        }

        let url = Url::parse(&format!("{}{}", self.base_url, filename.trim_start_matches('/')))
            .map_err(|_| BlobError::UrlUnavailable(filename.to_string()))?;

        let hash = hex::encode(blake3::hash(&bytes).as_bytes());
        self.blobs.write().entry(hash.clone()).or_insert(bytes);
        let name = url.as_str().strip_prefix(&self.base_url).unwrap_or(filename);
        self.names.write().insert(name.to_string(), hash.clone());

        debug!(filename, hash = &hash[..8], "Stored blob");
        Ok(url)
    }
}
