//! Conversion between [`Message`] and its stored form
//!
//! Decoding is deliberately not the inverse of encoding: any tag other than
//! `photo`, `video` or `location` is read back as text, including tags this
//! codec writes itself with empty content.

use murmur_core::StorageKey;
use serde_json::{Map, Value};
use url::Url;

use crate::error::DecodeError;
use crate::message::{KindTag, Location, MediaItem, Message, MessageKind, MessageRecord, Sender};
use crate::timestamp::{DateFormat, parse_date};

/// Encodes and decodes message records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCodec {
    date_format: DateFormat,
}

impl MessageCodec {
    pub fn new(date_format: DateFormat) -> Self {
        Self { date_format }
    }

    pub fn date_format(&self) -> DateFormat {
        self.date_format
    }

    /// Content string for a payload
    pub fn encode(kind: &MessageKind) -> String {
        match kind {
            MessageKind::Text(text) => text.clone(),
            MessageKind::Photo(media) | MessageKind::Video(media) => media.url.to_string(),
            MessageKind::Location(location) => {
                format!("{:?},{:?}", location.longitude, location.latitude)
            }
            MessageKind::AttributedText(_)
            | MessageKind::Emoji(_)
            | MessageKind::Audio(_)
            | MessageKind::Contact(_)
            | MessageKind::Custom(_) => String::new(),
        }
    }

    /// Payload for a `type`/`content` pair
    ///
    /// # Errors
    ///
    /// Fails when a location is not two numbers or a photo/video is not an
    /// absolute URL. Unknown tags never fail.
    pub fn decode(kind: &str, content: &str) -> Result<MessageKind, DecodeError> {
        match kind.parse::<KindTag>() {
            Ok(KindTag::Photo) => Ok(MessageKind::Photo(parse_media(content)?)),
            Ok(KindTag::Video) => Ok(MessageKind::Video(parse_media(content)?)),
            Ok(KindTag::Location) => parse_location(content).map(MessageKind::Location),
            _ => Ok(MessageKind::Text(content.to_string())),
        }
    }

    /// Wire form of a message
    pub fn to_record(&self, message: &Message) -> MessageRecord {
        MessageRecord {
            id: message.id.clone(),
            kind: message.kind.kind_tag().to_string(),
            content: Self::encode(&message.kind),
            date: self.date_format.format(&message.sent_at),
            sender_email: message.sender.key.to_string(),
            is_read: false,
            name: message.sender.display_name.clone(),
        }
    }

    /// Message from its wire form
    pub fn from_record(record: &MessageRecord) -> Result<Message, DecodeError> {
        let sent_at = parse_date(&record.date)?;
        let key =
            StorageKey::from_raw(record.sender_email.clone()).map_err(|_| {
                DecodeError::InvalidField {
                    field: "sender_email",
                    expected: "storage key",
                }
            })?;
        let kind = Self::decode(&record.kind, &record.content)?;
        Ok(Message {
            id: record.id.clone(),
            sender: Sender {
                key,
                display_name: record.name.clone(),
            },
            sent_at,
            kind,
        })
    }

    /// Check the required-field contract of a raw stored record and decode it
    pub fn decode_value(value: &Value) -> Result<Message, DecodeError> {
        let map = value.as_object().ok_or(DecodeError::InvalidField {
            field: "record",
            expected: "object",
        })?;
        let record = MessageRecord {
            name: string_field(map, "name")?,
            is_read: bool_field(map, "is_read")?,
            id: string_field(map, "id")?,
            content: string_field(map, "content")?,
            sender_email: string_field(map, "sender_email")?,
            kind: string_field(map, "type")?,
            date: string_field(map, "date")?,
        };
        Self::from_record(&record)
    }
}

fn string_field(map: &Map<String, Value>, field: &'static str) -> Result<String, DecodeError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DecodeError::InvalidField {
            field,
            expected: "string",
        }),
    }
}

fn bool_field(map: &Map<String, Value>, field: &'static str) -> Result<bool, DecodeError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(DecodeError::InvalidField {
            field,
            expected: "bool",
        }),
    }
}

fn parse_media(content: &str) -> Result<MediaItem, DecodeError> {
    Url::parse(content)
        .map(MediaItem::new)
        .map_err(|_| DecodeError::InvalidUrl(content.to_string()))
}

fn parse_location(content: &str) -> Result<Location, DecodeError> {
    let invalid = || DecodeError::InvalidLocation(content.to_string());
    let mut parts = content.split(',');
    let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let longitude = lon.parse::<f64>().map_err(|_| invalid())?;
    let latitude = lat.parse::<f64>().map_err(|_| invalid())?;
    Ok(Location::new(longitude, latitude))
}
