//! Conversation engine
//!
//! A conversation is stored three times: one summary under each participant
//! and the message list under its own id. The store has no transactions, so
//! every operation here is a sequence of independent whole-value writes.
//! When a later write fails the earlier ones stay committed.
//!
//! Tree layout:
//!
//! ```text
//! /<userKey>                    { first_name, last_name, conversations: [summary...] }
//! /<userKey>/conversations      [summary...]
//! /conversation_<id>/messages   [record...]
//! ```

use std::sync::Arc;

use murmur_core::{Clock, CurrentUser, RemoteTreeStore, StorageKey, SystemClock, TreePath};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::codec::MessageCodec;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::message::{
    ConversationId, ConversationSummary, LatestMessage, Message, MessageKind, UserRecord,
};
use crate::update::{into_list, update_path};

/// Field of the user record holding the summary list
pub const CONVERSATIONS_FIELD: &str = "conversations";
/// Child of a conversation node holding its message list
pub const MESSAGES_FIELD: &str = "messages";

/// Creates, updates and removes conversations on behalf of a caller
#[derive(Clone)]
pub struct ConversationSync {
    pub(crate) store: Arc<dyn RemoteTreeStore>,
    clock: Arc<dyn Clock>,
    pub(crate) config: SyncConfig,
    pub(crate) codec: MessageCodec,
}

impl std::fmt::Debug for ConversationSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSync")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConversationSync {
    /// Create an engine over `store`
    pub fn new(store: Arc<dyn RemoteTreeStore>, config: SyncConfig) -> Self {
        let codec = MessageCodec::new(config.date_format);
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
            codec,
        }
    }

    /// Use `clock` for message timestamps and ids
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RemoteTreeStore> {
        &self.store
    }

    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    /// Build a message from `me` to `counterpart`, stamped now
    pub fn compose(&self, me: &CurrentUser, counterpart: &StorageKey, kind: MessageKind) -> Message {
        let now = self.clock.now_utc();
        let id = self
            .config
            .id_strategy
            .generate(counterpart.as_str(), me.key().as_str(), now);
        Message::new(id, me, now, kind)
    }

    /// Path of a user's summary list
    pub fn conversations_path(key: &StorageKey) -> SyncResult<TreePath> {
        Ok(TreePath::user(key)?.child(CONVERSATIONS_FIELD)?)
    }

    /// Path of a conversation's message list
    pub fn messages_path(conversation_id: &ConversationId) -> SyncResult<TreePath> {
        Ok(TreePath::root()
            .child(conversation_id.as_str())?
            .child(MESSAGES_FIELD)?)
    }

    fn latest_message(&self, message: &Message) -> LatestMessage {
        LatestMessage {
            date: self.codec.date_format().format(&message.sent_at),
            message: MessageCodec::encode(&message.kind),
            is_read: false,
        }
    }

    /// Start a conversation with `counterpart` whose first message is `first_message`
    ///
    /// Writes the counterpart's summary, then the caller's record, then the
    /// message list. A failure leaves earlier writes in place.
    ///
    /// # Errors
    ///
    /// [`SyncError::UserNotFound`] if the caller has no user record, and
    /// [`DecodeError::Shape`](crate::DecodeError::Shape) if the node there
    /// is not a user record. Both are checked before anything is written.
    #[instrument(skip(self, me, first_message), fields(user = %me.key(), counterpart = %counterpart))]
    pub async fn create_conversation(
        &self,
        me: &CurrentUser,
        counterpart: &StorageKey,
        counterpart_name: &str,
        first_message: &Message,
    ) -> SyncResult<ConversationId> {
        // Nothing is written until the caller's node is known to be usable
        let user_path = TreePath::user(me.key())?;
        match self.store.get(&user_path).await?.value {
            Some(value) => {
                UserRecord::from_node(&user_path, value)?;
            }
            None => return Err(SyncError::UserNotFound(me.key().to_string())),
        }

        let conversation_id = ConversationId::from_first_message(&first_message.id);
        let latest = self.latest_message(first_message);

        let theirs = serde_json::to_value(ConversationSummary {
            id: conversation_id.to_string(),
            other_user_email: me.key().to_string(),
            name: me.display_name().to_string(),
            latest_message: latest.clone(),
        })?;
        let their_path = Self::conversations_path(counterpart)?;
        update_path(self.store.as_ref(), &their_path, &self.config.retry, |current| {
            let mut list = into_list(&their_path, current)?;
            list.push(theirs.clone());
            Ok((Value::Array(list), ()))
        })
        .await?;
        debug!(path = %their_path, "Added counterpart summary");

        let mine = serde_json::to_value(ConversationSummary {
            id: conversation_id.to_string(),
            other_user_email: counterpart.to_string(),
            name: counterpart_name.to_string(),
            latest_message: latest,
        })?;
        update_path(self.store.as_ref(), &user_path, &self.config.retry, |current| {
            let value = current.ok_or_else(|| SyncError::UserNotFound(me.key().to_string()))?;
            let mut record = UserRecord::from_node(&user_path, value)?;
            record
                .conversations
                .get_or_insert_with(Vec::new)
                .push(mine.clone());
            Ok((serde_json::to_value(record)?, ()))
        })
        .await?;
        debug!(path = %user_path, "Added own summary");

        let record = serde_json::to_value(vec![self.codec.to_record(first_message)])?;
        let messages_path = Self::messages_path(&conversation_id)?;
        self.store.set(&messages_path, record).await?;

        info!(conversation = %conversation_id, "Created conversation");
        Ok(conversation_id)
    }

    /// Append `message` to an existing conversation and refresh both summaries
    ///
    /// The message list is written first. The two summaries are then updated
    /// concurrently; a summary missing its entry gets a new one.
    ///
    /// # Errors
    ///
    /// [`SyncError::ConversationNotFound`] if the message list does not exist.
    /// [`SyncError::PartialFailure`] if the message was stored but a summary
    /// update failed.
    #[instrument(skip(self, me, message), fields(user = %me.key(), conversation = %conversation_id))]
    pub async fn send_message(
        &self,
        me: &CurrentUser,
        conversation_id: &ConversationId,
        counterpart: &StorageKey,
        counterpart_name: &str,
        message: &Message,
    ) -> SyncResult<()> {
        let messages_path = Self::messages_path(conversation_id)?;
        let record = serde_json::to_value(self.codec.to_record(message))?;
        update_path(self.store.as_ref(), &messages_path, &self.config.retry, |current| {
            let mut list = match current {
                Some(value) => into_list(&messages_path, Some(value))?,
                None => return Err(SyncError::ConversationNotFound(conversation_id.to_string())),
            };
            list.push(record.clone());
            Ok((Value::Array(list), ()))
        })
        .await?;
        debug!(path = %messages_path, "Appended message");

        let latest = self.latest_message(message);
        let mine = ConversationSummary {
            id: conversation_id.to_string(),
            other_user_email: counterpart.to_string(),
            name: counterpart_name.to_string(),
            latest_message: latest.clone(),
        };
        let theirs = ConversationSummary {
            id: conversation_id.to_string(),
            other_user_email: me.key().to_string(),
            name: me.display_name().to_string(),
            latest_message: latest,
        };

        let (my_result, their_result) = tokio::join!(
            self.refresh_summary(me.key(), mine),
            self.refresh_summary(counterpart, theirs),
        );

        let mut committed = vec![messages_path.to_string()];
        let mut failures = Vec::new();
        for (result, key) in [(my_result, me.key()), (their_result, counterpart)] {
            match result {
                Ok(path) => committed.push(path.to_string()),
                Err(e) => {
                    warn!(user = %key, error = %e, "Summary update failed");
                    failures.push(e);
                }
            }
        }
        if let Some(failed) = failures.into_iter().next() {
            return Err(SyncError::PartialFailure {
                committed,
                failed: Box::new(failed),
            });
        }

        info!(message = %message.id, "Sent message");
        Ok(())
    }

    /// Replace the latest message of `summary.id` under `owner`, appending
    /// the summary if the owner has no entry for it
    async fn refresh_summary(
        &self,
        owner: &StorageKey,
        summary: ConversationSummary,
    ) -> SyncResult<TreePath> {
        let path = Self::conversations_path(owner)?;
        let latest = serde_json::to_value(&summary.latest_message)?;
        let fresh = serde_json::to_value(&summary)?;
        update_path(self.store.as_ref(), &path, &self.config.retry, |current| {
            let mut list = into_list(&path, current)?;
            let entry = list
                .iter_mut()
                .find(|entry| entry.get("id").and_then(Value::as_str) == Some(summary.id.as_str()));
            match entry {
                Some(Value::Object(fields)) => {
                    fields.insert("latest_message".to_string(), latest.clone());
                }
                _ => list.push(fresh.clone()),
            }
            Ok((Value::Array(list), ()))
        })
        .await?;
        Ok(path)
    }

    /// Remove the caller's summary of a conversation
    ///
    /// The counterpart's summary and the message list are left untouched, so
    /// the conversation stays live for the other participant.
    ///
    /// # Errors
    ///
    /// [`SyncError::ConversationNotFound`] if the caller has no such entry.
    #[instrument(skip(self, me), fields(user = %me.key(), conversation = %conversation_id))]
    pub async fn hide_conversation(
        &self,
        me: &CurrentUser,
        conversation_id: &ConversationId,
    ) -> SyncResult<()> {
        self.remove_summary(me.key(), conversation_id).await?;
        info!("Hid conversation");
        Ok(())
    }

    /// One-sided delete; same as [`Self::hide_conversation`]
    pub async fn delete_conversation(
        &self,
        me: &CurrentUser,
        conversation_id: &ConversationId,
    ) -> SyncResult<()> {
        self.hide_conversation(me, conversation_id).await
    }

    /// Remove both summaries and the message list
    ///
    /// A counterpart who already dropped their summary is not an error.
    ///
    /// # Errors
    ///
    /// [`SyncError::ConversationNotFound`] if the caller has no such entry.
    #[instrument(skip(self, me), fields(user = %me.key(), conversation = %conversation_id))]
    pub async fn delete_conversation_everywhere(
        &self,
        me: &CurrentUser,
        conversation_id: &ConversationId,
    ) -> SyncResult<()> {
        let summary = self
            .fetch_conversations(me.key())
            .await?
            .into_iter()
            .find(|s| s.id == conversation_id.as_str())
            .ok_or_else(|| SyncError::ConversationNotFound(conversation_id.to_string()))?;

        if let Some(counterpart) = summary.counterpart() {
            match self.remove_summary(&counterpart, conversation_id).await {
                Ok(()) | Err(SyncError::ConversationNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        } else {
            warn!(other = %summary.other_user_email, "Summary has a malformed counterpart key");
        }

        let conversation_path = TreePath::root().child(conversation_id.as_str())?;
        self.store.remove(&conversation_path).await?;

        // The caller's entry goes last so a failed delete can be retried.
        self.remove_summary(me.key(), conversation_id).await?;
        info!("Deleted conversation everywhere");
        Ok(())
    }

    async fn remove_summary(
        &self,
        owner: &StorageKey,
        conversation_id: &ConversationId,
    ) -> SyncResult<()> {
        let path = Self::conversations_path(owner)?;
        update_path(self.store.as_ref(), &path, &self.config.retry, |current| {
            let mut list = into_list(&path, current)?;
            let position = list
                .iter()
                .position(|entry| {
                    entry.get("id").and_then(Value::as_str) == Some(conversation_id.as_str())
                })
                .ok_or_else(|| SyncError::ConversationNotFound(conversation_id.to_string()))?;
            list.remove(position);
            Ok((Value::Array(list), ()))
        })
        .await?;
        debug!(path = %path, "Removed summary");
        Ok(())
    }

    /// Id of the conversation `target` has with the caller
    ///
    /// # Errors
    ///
    /// [`SyncError::NoExistingConversation`] if there is none.
    #[instrument(skip(self, me), fields(user = %me.key(), target = %target))]
    pub async fn find_existing_conversation(
        &self,
        me: &CurrentUser,
        target: &StorageKey,
    ) -> SyncResult<ConversationId> {
        let path = Self::conversations_path(target)?;
        let snapshot = self.store.get(&path).await?;
        into_list(&path, snapshot.value)?
            .iter()
            .find(|entry| {
                entry.get("other_user_email").and_then(Value::as_str) == Some(me.key().as_str())
            })
            .and_then(|entry| entry.get("id").and_then(Value::as_str))
            .map(ConversationId::from_raw)
            .ok_or_else(|| SyncError::NoExistingConversation(target.to_string()))
    }
}
