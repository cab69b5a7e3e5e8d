//! # Murmur Core
//!
//! Core traits, types, and errors for the Murmur chat stack.
//!
//! Murmur keeps users, conversations and messages in a remotely hosted
//! hierarchical key-value store. This crate defines the contract of that
//! store and the identities used to address it, so the conversation engine
//! works the same against a real backend and the in-memory one used in tests.
//!
//! ## Key Traits
//!
//! - [`RemoteTreeStore`]: whole-value get/set/observe with conditional writes
//! - [`BlobUploader`]: media upload returning a public URL
//! - [`Clock`]: time abstraction for testability
//!
//! ## Key Types
//!
//! - [`TreePath`]: validated slash-separated path
//! - [`Snapshot`] and [`Version`]: a value and its ETag
//! - [`StorageKey`]: storage-safe form of an email address
//! - [`CurrentUser`]: explicit caller identity passed to every engine call

pub mod error;
pub mod identity;
pub mod traits;
pub mod tree;

// Re-export main types
pub use error::*;
pub use identity::*;
pub use traits::*;
pub use tree::*;
