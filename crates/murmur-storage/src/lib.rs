//! # Murmur Storage
//!
//! Storage backends for Murmur.
//!
//! ## Features
//!
//! - **InMemoryTreeStore**: hierarchical JSON tree implementing `RemoteTreeStore`,
//!   with ETag versions for conditional writes and change subscriptions
//! - **FaultPlan**: injected read/write failures for partial-failure tests
//! - **InMemoryBlobStore**: content-addressed `BlobUploader`
//!
//! ## Example
//!
//! ```rust
//! use murmur_core::{RemoteTreeStore, TreePath};
//! use murmur_storage::InMemoryTreeStore;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryTreeStore::new();
//! let path = TreePath::parse("a-example-com").unwrap();
//!
//! store.set(&path, json!({"first_name": "A", "last_name": "Doe"})).await.unwrap();
//!
//! let snapshot = store.get(&path).await.unwrap();
//! assert_eq!(snapshot.value.unwrap()["first_name"], "A");
//! # });
//! ```

pub mod blobs;
pub mod error;
pub mod fault;
pub mod memory;

// Re-exports
pub use blobs::InMemoryBlobStore;
pub use error::StorageError;
pub use fault::{FaultOp, FaultPlan};
pub use memory::{InMemoryTreeStore, version_of};
