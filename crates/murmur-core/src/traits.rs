//! Core traits for Murmur
//!
//! These traits are the seams between the conversation engine and the
//! outside world, so the engine can run against an in-memory fake in tests.
//!
//! ## Key Traits
//!
//! - [`RemoteTreeStore`]: whole-value get/set/observe over a path-addressed tree
//! - [`BlobUploader`]: turns raw bytes into a publicly fetchable URL
//! - [`Clock`]: time abstraction for testability

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::Value;
use url::Url;

use crate::error::{BlobError, StoreError};
use crate::tree::{Snapshot, TreePath, Version};

/// Stream of snapshots delivered by [`RemoteTreeStore::observe`]
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Snapshot> + Send>>;

/// A remotely hosted hierarchical key-value store
///
/// There are no multi-path transactions and no partial updates: callers
/// read a path's whole value, change a copy and write the whole value back.
/// [`RemoteTreeStore::set_if_version`] is the only concurrency primitive.
#[async_trait]
pub trait RemoteTreeStore: Send + Sync {
    /// Read the whole value at `path`
    ///
    /// A path with no data yields a snapshot whose `value` is `None`.
    async fn get(&self, path: &TreePath) -> Result<Snapshot, StoreError>;

    /// Replace the whole value at `path`
    ///
    /// Writing `null` removes the node. Returns the new version tag.
    async fn set(&self, path: &TreePath, value: Value) -> Result<Version, StoreError>;

    /// Replace the value at `path` only if its tag still equals `expected`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] if another writer got there first.
    async fn set_if_version(
        &self,
        path: &TreePath,
        value: Value,
        expected: &Version,
    ) -> Result<Version, StoreError>;

    /// Remove the node at `path` and everything below it
    async fn remove(&self, path: &TreePath) -> Result<(), StoreError> {
        self.set(path, Value::Null).await.map(|_| ())
    }

    /// Subscribe to the value at `path`
    ///
    /// The stream yields the current snapshot first, then a new snapshot
    /// after every write that touches `path`, an ancestor or a descendant.
    /// Each item replaces the previous one.
    fn observe(&self, path: &TreePath) -> SnapshotStream;
}

/// Uploads media and hands back a URL other clients can fetch
#[async_trait]
pub trait BlobUploader: Send + Sync {
    /// Store `bytes` under `filename` (a slash-separated object name)
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<Url, BlobError>;
}

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the store traits are object-safe
    fn _assert_object_safe(_: &dyn RemoteTreeStore, _: &dyn BlobUploader, _: &dyn Clock) {}

    #[test]
    fn test_fixed_clock() {
        let at = DateTime::parse_from_rfc3339("2020-09-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = FixedClock(at);
        assert_eq!(clock.now_utc(), at);
        assert!(SystemClock.now_utc() > at);
    }
}
