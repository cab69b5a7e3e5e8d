//! One-shot reads and continuous listeners
//!
//! Listeners wrap [`observe`](murmur_core::RemoteTreeStore::observe): each
//! item is the complete, freshly decoded state of the path and replaces
//! whatever the consumer held before. An error item does not end the
//! stream; the next change is still delivered.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use murmur_core::{StorageKey, TreePath};
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::MessageCodec;
use crate::engine::ConversationSync;
use crate::error::{DecodeError, SyncError, SyncResult};
use crate::message::{ConversationId, ConversationSummary, Message};
use crate::update::into_list;

/// Stream of a user's summary list
pub type ConversationStream =
    Pin<Box<dyn Stream<Item = SyncResult<Vec<ConversationSummary>>> + Send>>;

/// Stream of a conversation's messages, malformed records dropped
pub type MessageStream = Pin<Box<dyn Stream<Item = SyncResult<Vec<Message>>> + Send>>;

/// Stream of a conversation's records with per-record outcomes
pub type MessageBatchStream = Pin<Box<dyn Stream<Item = SyncResult<MessageBatch>> + Send>>;

/// Every record of a message list, decoded or not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageBatch {
    /// One entry per stored record, in stored order
    pub entries: Vec<Result<Message, DecodeError>>,
}

impl MessageBatch {
    /// Decode every stored record
    pub fn decode(records: &[Value]) -> Self {
        Self {
            entries: records.iter().map(MessageCodec::decode_value).collect(),
        }
    }

    /// Records that decoded
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|entry| entry.as_ref().ok())
    }

    /// Records that did not decode
    pub fn failures(&self) -> impl Iterator<Item = &DecodeError> {
        self.entries.iter().filter_map(|entry| entry.as_ref().err())
    }

    /// True when the list holds no records at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Decoded messages, dropping failures
    pub fn into_messages(self) -> Vec<Message> {
        self.entries.into_iter().filter_map(Result::ok).collect()
    }
}

/// Decode a summary list, dropping entries that miss required fields
fn decode_summaries(
    path: &TreePath,
    value: Option<Value>,
) -> Result<Vec<ConversationSummary>, DecodeError> {
    let summaries = into_list(path, value)?
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(summary) => Some(summary),
            Err(e) => {
                debug!(path = %path, error = %e, "Dropping malformed summary");
                None
            }
        })
        .collect();
    Ok(summaries)
}

/// Decode a message list; a path with no data is an unknown conversation
fn decode_batch(
    conversation_id: &ConversationId,
    path: &TreePath,
    value: Option<Value>,
) -> SyncResult<MessageBatch> {
    let Some(value) = value else {
        return Err(SyncError::ConversationNotFound(conversation_id.to_string()));
    };
    let records = into_list(path, Some(value))?;
    Ok(MessageBatch::decode(&records))
}

fn drop_failures(batch: MessageBatch) -> Vec<Message> {
    for failure in batch.failures() {
        warn!(error = %failure, "Dropping malformed message");
    }
    batch.into_messages()
}

impl ConversationSync {
    /// Current summary list of `user`; empty if there is none
    pub async fn fetch_conversations(
        &self,
        user: &StorageKey,
    ) -> SyncResult<Vec<ConversationSummary>> {
        let path = Self::conversations_path(user)?;
        let snapshot = self.store.get(&path).await?;
        Ok(decode_summaries(&path, snapshot.value)?)
    }

    /// Current messages of a conversation, malformed records dropped
    pub async fn fetch_messages(&self, conversation_id: &ConversationId) -> SyncResult<Vec<Message>> {
        self.fetch_message_records(conversation_id)
            .await
            .map(drop_failures)
    }

    /// Current records of a conversation with per-record outcomes
    pub async fn fetch_message_records(
        &self,
        conversation_id: &ConversationId,
    ) -> SyncResult<MessageBatch> {
        let path = Self::messages_path(conversation_id)?;
        let snapshot = self.store.get(&path).await?;
        decode_batch(conversation_id, &path, snapshot.value)
    }

    /// Follow the summary list of `user`
    pub fn listen_conversations(&self, user: &StorageKey) -> ConversationStream {
        let store = self.store.clone();
        let path = Self::conversations_path(user);
        Box::pin(async_stream::stream! {
            match path {
                Ok(path) => {
                    let mut snapshots = store.observe(&path);
                    while let Some(snapshot) = snapshots.next().await {
                        yield decode_summaries(&path, snapshot.value).map_err(SyncError::from);
                    }
                }
                Err(e) => {
                    yield Err(e);
                }
            }
        })
    }

    /// Follow a conversation's messages, dropping records that do not decode
    pub fn listen_messages(&self, conversation_id: &ConversationId) -> MessageStream {
        Box::pin(
            self.listen_message_records(conversation_id)
                .map(|batch| batch.map(drop_failures)),
        )
    }

    /// Follow a conversation's records, reporting each record's outcome
    pub fn listen_message_records(&self, conversation_id: &ConversationId) -> MessageBatchStream {
        let store = self.store.clone();
        let conversation_id = conversation_id.clone();
        let path = Self::messages_path(&conversation_id);
        Box::pin(async_stream::stream! {
            match path {
                Ok(path) => {
                    let mut snapshots = store.observe(&path);
                    while let Some(snapshot) = snapshots.next().await {
                        yield decode_batch(&conversation_id, &path, snapshot.value);
                    }
                }
                Err(e) => {
                    yield Err(e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::RemoteTreeStore;
    use murmur_storage::InMemoryTreeStore;
    use serde_json::json;
    use std::sync::Arc;

    use crate::config::SyncConfig;

    fn record(id: &str, kind: &str, content: &str) -> Value {
        json!({
            "id": id,
            "type": kind,
            "content": content,
            "date": "2020-09-01T15:04:05.000Z",
            "sender_email": "a-example-com",
            "is_read": false,
            "name": "Alice",
        })
    }

    fn engine(store: &InMemoryTreeStore) -> ConversationSync {
        ConversationSync::new(Arc::new(store.clone()), SyncConfig::default())
    }

    #[test]
    fn test_batch_accessors() {
        let batch = MessageBatch::decode(&[
            record("m1", "text", "hi"),
            record("m2", "location", "bad"),
        ]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.messages().count(), 1);
        assert!(matches!(
            batch.failures().next(),
            Some(DecodeError::InvalidLocation(_))
        ));
        assert!(!batch.is_empty());
        assert_eq!(batch.into_messages()[0].id, "m1");
    }

    #[tokio::test]
    async fn test_fetch_conversations_absent_is_empty() {
        let store = InMemoryTreeStore::new();
        let key = StorageKey::from_email("a@example.com").unwrap();
        assert!(engine(&store).fetch_conversations(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_conversations_drops_incomplete_entries() {
        let store = InMemoryTreeStore::new();
        store
            .load_json(
                r#"{"a-example-com": {"conversations": [
                    {"id": "conversation_1", "other_user_email": "b-example-com", "name": "Bob",
                     "latest_message": {"date": "d", "message": "hi", "is_read": false}},
                    {"id": "conversation_2"}
                ]}}"#,
            )
            .unwrap();
        let key = StorageKey::from_email("a@example.com").unwrap();
        let summaries = engine(&store).fetch_conversations(&key).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "conversation_1");
    }

    #[tokio::test]
    async fn test_fetch_messages_unknown_conversation() {
        let store = InMemoryTreeStore::new();
        let result = engine(&store)
            .fetch_messages(&ConversationId::from_raw("conversation_x"))
            .await;
        assert!(matches!(result, Err(SyncError::ConversationNotFound(_))));
    }

    #[tokio::test]
    async fn test_listen_conversations_shape_error_then_recovers() {
        let store = InMemoryTreeStore::new();
        let key = StorageKey::from_email("a@example.com").unwrap();
        let path = ConversationSync::conversations_path(&key).unwrap();
        store.set(&path, json!("not a list")).await.unwrap();

        let mut stream = engine(&store).listen_conversations(&key);
        assert!(matches!(
            stream.next().await,
            Some(Err(SyncError::Decode(DecodeError::Shape { .. })))
        ));

        store.set(&path, json!([])).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn test_listen_messages_drops_malformed() {
        let store = InMemoryTreeStore::new();
        let id = ConversationId::from_raw("conversation_1");
        let path = ConversationSync::messages_path(&id).unwrap();
        store
            .set(
                &path,
                json!([record("m1", "location", "10.0,20.0"), record("m2", "location", "bad")]),
            )
            .await
            .unwrap();

        let sync = engine(&store);
        let messages = sync.listen_messages(&id).next().await.unwrap().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");

        let batch = sync.listen_message_records(&id).next().await.unwrap().unwrap();
        assert_eq!(batch.failures().count(), 1);
    }
}
