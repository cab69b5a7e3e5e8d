//! # Murmur Messaging
//!
//! Conversation and message synchronization over a remote tree store.
//!
//! Each conversation lives in three independently written places: a summary
//! under each participant's user record and a message list under the
//! conversation id. [`ConversationSync`] keeps them in step using nothing but
//! whole-value reads and writes, with conditional writes and bounded retries
//! so concurrent senders do not overwrite each other.
//!
//! ## Features
//!
//! - Conversation creation, message sending and fan-out of summaries
//! - One-sided hide and full delete of conversations
//! - One-shot fetches and continuous listeners
//! - User directory and media uploads
//! - Wire compatibility with older clients through [`SyncConfig::legacy`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use murmur_core::CurrentUser;
//! use murmur_messaging::{ConversationSync, MessageKind, NewUser, SyncConfig, UserDirectory};
//! use murmur_storage::InMemoryTreeStore;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemoryTreeStore::new());
//! let directory = UserDirectory::new(store.clone(), SyncConfig::default());
//! directory.insert_user(&NewUser::new("Alice", "Example", "a@example.com")).await?;
//! let bob = directory.insert_user(&NewUser::new("Bob", "Example", "b@example.com")).await?;
//!
//! let sync = ConversationSync::new(store, SyncConfig::default());
//! let alice = CurrentUser::new("a@example.com", "Alice Example")?;
//!
//! let hello = sync.compose(&alice, &bob, MessageKind::text("hi"));
//! let id = sync.create_conversation(&alice, &bob, "Bob Example", &hello).await?;
//!
//! let reply = sync.compose(&alice, &bob, MessageKind::location(10.0, 20.0));
//! sync.send_message(&alice, &id, &bob, "Bob Example", &reply).await?;
//!
//! assert_eq!(sync.fetch_messages(&id).await?.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod codec;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod id;
pub mod media;
pub mod message;
pub mod query;
pub mod timestamp;
pub mod update;

// Re-exports
pub use codec::MessageCodec;
pub use config::{ConfigError, RetryPolicy, SyncConfig};
pub use directory::{NewUser, UserDirectory};
pub use engine::ConversationSync;
pub use error::{DecodeError, SyncError, SyncResult};
pub use id::IdStrategy;
pub use media::{MediaKind, MediaUploader, media_filename};
pub use message::{
    ConversationId, ConversationSummary, DirectoryEntry, KindTag, LatestMessage, Location,
    MediaItem, Message, MessageKind, MessageRecord, Sender, UserRecord,
};
pub use query::{ConversationStream, MessageBatch, MessageBatchStream, MessageStream};
pub use timestamp::{DateFormat, parse_date};
pub use update::update_path;
