//! Message, conversation and user types
//!
//! Two layers live here. [`Message`] and [`MessageKind`] are what callers
//! work with. [`MessageRecord`], [`ConversationSummary`], [`UserRecord`] and
//! [`DirectoryEntry`] mirror the JSON that other clients read and write, so
//! their field names are fixed.

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use murmur_core::{CurrentUser, StorageKey, TreePath};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::DecodeError;

/// Prefix that turns a first-message id into a conversation id
pub const CONVERSATION_PREFIX: &str = "conversation_";

/// A remotely hosted media object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Where other clients fetch the object from
    pub url: Url,
}

impl MediaItem {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

/// A point on the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

impl Location {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// Payload of a message
///
/// Only text, photo, video and location have a content encoding. The other
/// kinds are written with empty content and read back as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageKind {
    Text(String),
    AttributedText(String),
    Photo(MediaItem),
    Video(MediaItem),
    Location(Location),
    Emoji(String),
    Audio(MediaItem),
    Contact(String),
    Custom(Value),
}

impl MessageKind {
    /// Create a text payload
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a location payload
    pub fn location(longitude: f64, latitude: f64) -> Self {
        Self::Location(Location::new(longitude, latitude))
    }

    /// Discriminator written to the `type` field
    pub fn kind_tag(&self) -> KindTag {
        match self {
            Self::Text(_) => KindTag::Text,
            Self::AttributedText(_) => KindTag::AttributedText,
            Self::Photo(_) => KindTag::Photo,
            Self::Video(_) => KindTag::Video,
            Self::Location(_) => KindTag::Location,
            Self::Emoji(_) => KindTag::Emoji,
            Self::Audio(_) => KindTag::Audio,
            Self::Contact(_) => KindTag::Contact,
            Self::Custom(_) => KindTag::Custom,
        }
    }

    /// Get the text if this is a text message
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Wire discriminator of a [`MessageKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindTag {
    Text,
    AttributedText,
    Photo,
    Video,
    Location,
    Emoji,
    Audio,
    Contact,
    Custom,
}

impl KindTag {
    pub const ALL: [KindTag; 9] = [
        KindTag::Text,
        KindTag::AttributedText,
        KindTag::Photo,
        KindTag::Video,
        KindTag::Location,
        KindTag::Emoji,
        KindTag::Audio,
        KindTag::Contact,
        KindTag::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KindTag::Text => "text",
            KindTag::AttributedText => "attributed_text",
            KindTag::Photo => "photo",
            KindTag::Video => "video",
            KindTag::Location => "location",
            KindTag::Emoji => "emoji",
            KindTag::Audio => "audio",
            KindTag::Contact => "contact",
            KindTag::Custom => "custom",
        }
    }
}

impl Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KindTag {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KindTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or(DecodeError::InvalidField {
                field: "type",
                expected: "known message kind",
            })
    }
}

/// Author of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub key: StorageKey,
    pub display_name: String,
}

impl From<&CurrentUser> for Sender {
    fn from(user: &CurrentUser) -> Self {
        Self {
            key: user.key().clone(),
            display_name: user.display_name().to_string(),
        }
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: String,
    /// Author of the message
    pub sender: Sender,
    /// When the message was sent
    pub sent_at: DateTime<Utc>,
    /// Message payload
    pub kind: MessageKind,
}

impl Message {
    /// Create a new message
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<Sender>,
        sent_at: DateTime<Utc>,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            sent_at,
            kind,
        }
    }
}

/// Wire form of a message inside `conversation_<id>/messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub date: String,
    pub sender_email: String,
    pub is_read: bool,
    pub name: String,
}

/// Most recent message of a conversation, embedded in each summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestMessage {
    pub date: String,
    pub message: String,
    pub is_read: bool,
}

/// One participant's view of a conversation
///
/// Every conversation has two of these, one under each participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    /// Storage key of the other participant
    pub other_user_email: String,
    /// Display name of the other participant
    pub name: String,
    pub latest_message: LatestMessage,
}

impl ConversationSummary {
    /// Storage key of the other participant, if it is well formed
    pub fn counterpart(&self) -> Option<StorageKey> {
        StorageKey::from_raw(self.other_user_email.clone()).ok()
    }
}

/// Record stored at `/<userKey>`
///
/// A counterpart who has not registered yet still gets summaries written
/// under their key, so a node may hold `conversations` and no names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversations: Option<Vec<Value>>,
    /// Fields written by other clients, preserved on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    /// Full name as shown in the directory
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whether the user has registered, as opposed to only having received
    /// conversations
    pub fn is_registered(&self) -> bool {
        !self.first_name.is_empty() || !self.last_name.is_empty()
    }

    /// Decode the node stored at a user's path
    pub fn from_node(path: &TreePath, value: Value) -> Result<Self, DecodeError> {
        if !value.is_object() {
            return Err(DecodeError::Shape {
                path: path.to_string(),
                reason: "expected a user record object".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| DecodeError::Shape {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Entry of the global `/users` directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    /// Storage key, despite the field name
    pub email: String,
}

/// Identifier shared by both summaries and the message list of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Derive the id from the id of the conversation's first message
    pub fn from_first_message(message_id: &str) -> Self {
        Self(format!("{}{}", CONVERSATION_PREFIX, message_id))
    }

    /// Wrap an id read back from a summary
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
