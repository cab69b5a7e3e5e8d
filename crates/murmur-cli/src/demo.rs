//! Scripted two-user exchange against the in-memory backends

use std::sync::Arc;

use anyhow::{Context, Result};
use murmur_core::{CurrentUser, RemoteTreeStore};
use murmur_logging::UserContextGuard;
use murmur_messaging::{
    ConversationSync, MediaUploader, MessageKind, NewUser, SyncConfig, UserDirectory,
};
use murmur_storage::{InMemoryBlobStore, InMemoryTreeStore};
use serde_json::{Map, Value, json};
use tracing::{Instrument, Span, info};

/// 1x1 transparent PNG
const DEMO_PHOTO: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

/// Email and display name of each participant
#[derive(Debug, Clone)]
pub struct DemoUsers {
    pub alice: (String, String),
    pub bob: (String, String),
}

/// Span tagged with the acting user; enter it around the user's awaits
fn acting_as(user: &CurrentUser, step: &'static str) -> Span {
    let _context = UserContextGuard::new(user);
    tracing::info_span!("demo", step, user = %user.key())
}

fn new_user(email: &str, display_name: &str) -> NewUser {
    let (first, last) = display_name
        .split_once(' ')
        .unwrap_or((display_name, ""));
    NewUser::new(first, last, email)
}

/// Register both users, exchange three messages and report the stored state
pub async fn run(config: SyncConfig, users: DemoUsers) -> Result<Value> {
    config.validate()?;

    let store = Arc::new(InMemoryTreeStore::new());
    let blobs = Arc::new(InMemoryBlobStore::new());
    let directory = UserDirectory::new(store.clone(), config.clone());
    let sync = ConversationSync::new(store.clone(), config);
    let media = MediaUploader::new(blobs);

    let (alice_email, alice_name) = &users.alice;
    let (bob_email, bob_name) = &users.bob;
    directory
        .insert_user(&new_user(alice_email, alice_name))
        .await
        .context("Failed to register first user")?;
    directory
        .insert_user(&new_user(bob_email, bob_name))
        .await
        .context("Failed to register second user")?;
    let alice = CurrentUser::new(alice_email, alice_name)?;
    let bob = CurrentUser::new(bob_email, bob_name)?;

    let hello = sync.compose(&alice, bob.key(), MessageKind::text(format!("Hi {bob_name}!")));
    let id = sync
        .create_conversation(&alice, bob.key(), bob_name, &hello)
        .instrument(acting_as(&alice, "create_conversation"))
        .await?;

    // Bob answers in the conversation he finds under his own record
    let found = sync
        .find_existing_conversation(&bob, alice.key())
        .instrument(acting_as(&bob, "find_existing_conversation"))
        .await?;
    let here = sync.compose(&bob, alice.key(), MessageKind::location(-122.4194, 37.7749));
    sync.send_message(&bob, &found, alice.key(), alice_name, &here)
        .instrument(acting_as(&bob, "send_location"))
        .await?;

    let mut photo = sync.compose(&alice, bob.key(), MessageKind::text(""));
    photo.kind = media
        .photo_message(DEMO_PHOTO.to_vec(), &photo.id)
        .instrument(acting_as(&alice, "upload_photo"))
        .await?;
    sync.send_message(&alice, &id, bob.key(), bob_name, &photo)
        .instrument(acting_as(&alice, "send_photo"))
        .await?;

    let messages = store
        .get(&ConversationSync::messages_path(&id)?)
        .await?
        .value
        .unwrap_or(Value::Null);
    let mut summaries = Map::new();
    for user in [&alice, &bob] {
        let listed = sync.fetch_conversations(user.key()).await?;
        summaries.insert(user.key().to_string(), serde_json::to_value(listed)?);
    }
    info!(conversation = %id, "demo exchange complete");

    Ok(json!({
        "conversation": id.as_str(),
        "summaries": summaries,
        "messages": messages,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> DemoUsers {
        DemoUsers {
            alice: ("a@example.com".to_string(), "Alice Example".to_string()),
            bob: ("b@example.com".to_string(), "Bob Example".to_string()),
        }
    }

    #[test]
    fn test_new_user_splits_display_name() {
        let user = new_user("c@example.com", "Carol Ann Example");
        assert_eq!(user.first_name, "Carol");
        assert_eq!(user.last_name, "Ann Example");

        let single = new_user("d@example.com", "Dee");
        assert_eq!(single.first_name, "Dee");
        assert!(single.last_name.is_empty());
    }

    #[tokio::test]
    async fn test_demo_report() {
        let report = run(SyncConfig::default(), users()).await.unwrap();

        let messages = report["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["type"], "text");
        assert_eq!(messages[0]["content"], "Hi Bob Example!");
        assert_eq!(messages[1]["type"], "location");
        assert_eq!(messages[1]["sender_email"], "b-example-com");
        assert_eq!(messages[2]["type"], "photo");

        for key in ["a-example-com", "b-example-com"] {
            let summaries = report["summaries"][key].as_array().unwrap();
            assert_eq!(summaries.len(), 1);
            assert_eq!(summaries[0]["id"], report["conversation"]);
            let latest = summaries[0]["latest_message"]["message"].as_str().unwrap();
            assert!(latest.contains("message_images/photo_message_"));
        }
    }

    #[tokio::test]
    async fn test_demo_with_legacy_config() {
        let report = run(SyncConfig::legacy(), users()).await.unwrap();
        let conversation = report["conversation"].as_str().unwrap();
        assert!(conversation.starts_with("conversation_b-example-com_a-example-com_"));
        assert!(conversation.ends_with(" UTC"));
    }

    #[tokio::test]
    async fn test_demo_rejects_invalid_email() {
        let mut users = users();
        users.bob.0 = "not-an-email".to_string();
        assert!(run(SyncConfig::default(), users).await.is_err());
    }
}
