//! End-to-end conversation scenarios
//!
//! Runs the engine against the in-memory tree store and checks the stored
//! tree after each operation: both summaries, the message list and the
//! identifiers tying them together.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use murmur_core::{CurrentUser, FixedClock, RemoteTreeStore, StorageKey, TreePath};
use murmur_messaging::{
    ConversationId, ConversationSync, DateFormat, MessageKind, NewUser, SyncConfig, SyncError,
    UserDirectory,
};
use murmur_storage::InMemoryTreeStore;
use serde_json::{Value, json};

// ============================================================================
// Helpers
// ============================================================================

struct World {
    store: InMemoryTreeStore,
    sync: ConversationSync,
    alice: CurrentUser,
    bob: CurrentUser,
}

async fn world(config: SyncConfig) -> World {
    let store = InMemoryTreeStore::new();
    let directory = UserDirectory::new(Arc::new(store.clone()), config.clone());
    directory
        .insert_user(&NewUser::new("Alice", "Example", "a@example.com"))
        .await
        .unwrap();
    directory
        .insert_user(&NewUser::new("Bob", "Example", "b@example.com"))
        .await
        .unwrap();

    let clock = FixedClock(Utc.with_ymd_and_hms(2020, 9, 1, 15, 4, 5).unwrap());
    let sync = ConversationSync::new(Arc::new(store.clone()), config).with_clock(Arc::new(clock));

    World {
        store,
        sync,
        alice: CurrentUser::new("a@example.com", "Alice Example").unwrap(),
        bob: CurrentUser::new("b@example.com", "Bob Example").unwrap(),
    }
}

impl World {
    async fn start(&self, text: &str) -> ConversationId {
        let message = self
            .sync
            .compose(&self.alice, self.bob.key(), MessageKind::text(text));
        self.sync
            .create_conversation(&self.alice, self.bob.key(), "Bob Example", &message)
            .await
            .unwrap()
    }

    async fn summaries(&self, user: &CurrentUser) -> Vec<Value> {
        let path = ConversationSync::conversations_path(user.key()).unwrap();
        match self.store.get(&path).await.unwrap().value {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }

    async fn messages(&self, id: &ConversationId) -> Vec<Value> {
        let path = ConversationSync::messages_path(id).unwrap();
        match self.store.get(&path).await.unwrap().value {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_distinct_emails_map_to_distinct_keys() {
    let emails = [
        "a@example.com",
        "a@example.org",
        "a.b@example.com",
        "ab@example.com",
        "b@example.com",
    ];
    let keys: HashSet<StorageKey> = emails
        .iter()
        .map(|e| StorageKey::from_email_strict(e).unwrap())
        .collect();
    assert_eq!(keys.len(), emails.len());
}

// ============================================================================
// Creating conversations
// ============================================================================

#[tokio::test]
async fn test_create_conversation_mirrors_summaries() {
    let w = world(SyncConfig::default()).await;
    let id = w.start("hi").await;

    let mine = w.summaries(&w.alice).await;
    let theirs = w.summaries(&w.bob).await;
    assert_eq!(mine.len(), 1);
    assert_eq!(theirs.len(), 1);

    assert_eq!(mine[0]["id"], id.as_str());
    assert_eq!(mine[0]["other_user_email"], "b-example-com");
    assert_eq!(mine[0]["name"], "Bob Example");
    assert_eq!(mine[0]["latest_message"]["message"], "hi");
    assert_eq!(mine[0]["latest_message"]["is_read"], false);

    assert_eq!(theirs[0]["id"], id.as_str());
    assert_eq!(theirs[0]["other_user_email"], "a-example-com");
    assert_eq!(theirs[0]["name"], "Alice Example");
    assert_eq!(theirs[0]["latest_message"], mine[0]["latest_message"]);

    let messages = w.messages(&id).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], "text");
    assert_eq!(messages[0]["content"], "hi");
    assert_eq!(messages[0]["sender_email"], "a-example-com");
    assert_eq!(
        id.as_str(),
        format!("conversation_{}", messages[0]["id"].as_str().unwrap())
    );
}

#[tokio::test]
async fn test_create_keeps_user_fields() {
    let w = world(SyncConfig::default()).await;
    w.start("hi").await;

    let record = w
        .store
        .get(&TreePath::user(w.alice.key()).unwrap())
        .await
        .unwrap()
        .value
        .unwrap();
    assert_eq!(record["first_name"], "Alice");
    assert_eq!(record["last_name"], "Example");
}

#[tokio::test]
async fn test_legacy_wire_format() {
    let w = world(SyncConfig::legacy()).await;
    let id = w.start("hi").await;

    assert_eq!(
        id.as_str(),
        "conversation_b-example-com_a-example-com_Sep 1, 2020 at 3:04:05 PM UTC"
    );
    let messages = w.messages(&id).await;
    assert_eq!(messages[0]["date"], "Sep 1, 2020 at 3:04:05 PM UTC");

    // A reader configured for RFC 3339 still understands legacy records.
    let reader = ConversationSync::new(
        Arc::new(w.store.clone()),
        SyncConfig::default().with_date_format(DateFormat::Rfc3339),
    );
    assert_eq!(reader.fetch_messages(&id).await.unwrap().len(), 1);
}

// ============================================================================
// Sending messages
// ============================================================================

#[tokio::test]
async fn test_send_appends_and_updates_both_summaries() {
    let w = world(SyncConfig::default()).await;
    let id = w.start("hi").await;

    let reply = w
        .sync
        .compose(&w.bob, w.alice.key(), MessageKind::location(10.0, 20.0));
    w.sync
        .send_message(&w.bob, &id, w.alice.key(), "Alice Example", &reply)
        .await
        .unwrap();

    let messages = w.messages(&id).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["type"], "location");
    assert_eq!(messages[1]["content"], "10.0,20.0");
    assert_eq!(messages[1]["sender_email"], "b-example-com");

    for user in [&w.alice, &w.bob] {
        let summaries = w.summaries(user).await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0]["latest_message"]["message"], "10.0,20.0");
        assert_eq!(
            summaries[0]["latest_message"]["date"],
            messages[1]["date"]
        );
    }
}

#[tokio::test]
async fn test_send_is_not_idempotent() {
    let w = world(SyncConfig::default()).await;
    let id = w.start("hi").await;

    for text in ["one", "two"] {
        let message = w
            .sync
            .compose(&w.alice, w.bob.key(), MessageKind::text(text));
        w.sync
            .send_message(&w.alice, &id, w.bob.key(), "Bob Example", &message)
            .await
            .unwrap();
    }

    let messages = w.messages(&id).await;
    assert_eq!(messages.len(), 3);
    let ids: HashSet<&str> = messages.iter().filter_map(|m| m["id"].as_str()).collect();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_summary_order_is_creation_order() {
    let w = world(SyncConfig::default()).await;
    let carol = CurrentUser::new("c@example.com", "Carol Example").unwrap();
    UserDirectory::new(Arc::new(w.store.clone()), SyncConfig::default())
        .insert_user(&NewUser::new("Carol", "Example", "c@example.com"))
        .await
        .unwrap();

    let with_bob = w.start("hi bob").await;
    let hello = w.sync.compose(&w.alice, carol.key(), MessageKind::text("hi carol"));
    let with_carol = w
        .sync
        .create_conversation(&w.alice, carol.key(), "Carol Example", &hello)
        .await
        .unwrap();

    // A newer message to Bob does not move his conversation to the end.
    let again = w.sync.compose(&w.alice, w.bob.key(), MessageKind::text("again"));
    w.sync
        .send_message(&w.alice, &with_bob, w.bob.key(), "Bob Example", &again)
        .await
        .unwrap();

    let summaries = w.sync.fetch_conversations(w.alice.key()).await.unwrap();
    let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![with_bob.as_str(), with_carol.as_str()]);
    assert_eq!(summaries[0].latest_message.message, "again");
}

// ============================================================================
// Counterparts who have not registered
// ============================================================================

fn carol() -> CurrentUser {
    CurrentUser::new("c@example.com", "Carol Example").unwrap()
}

#[tokio::test]
async fn test_counterpart_registers_after_receiving() {
    let w = world(SyncConfig::default()).await;
    let hello = w.sync.compose(&w.alice, carol().key(), MessageKind::text("hi carol"));
    let id = w
        .sync
        .create_conversation(&w.alice, carol().key(), "Carol Example", &hello)
        .await
        .unwrap();

    let directory = UserDirectory::new(Arc::new(w.store.clone()), SyncConfig::default());
    assert!(!directory.user_exists("c@example.com").await.unwrap());
    assert!(
        directory
            .ensure_user(&NewUser::new("Carol", "Example", "c@example.com"))
            .await
            .unwrap()
    );

    // Registering keeps the conversation that was waiting for her
    let record = directory.get_user(carol().key()).await.unwrap();
    assert_eq!(record.full_name(), "Carol Example");
    let summaries = w.sync.fetch_conversations(carol().key()).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, id.as_str());
}

#[tokio::test]
async fn test_unregistered_counterpart_starts_conversation() {
    let w = world(SyncConfig::default()).await;
    let hello = w.sync.compose(&w.alice, carol().key(), MessageKind::text("hi carol"));
    w.sync
        .create_conversation(&w.alice, carol().key(), "Carol Example", &hello)
        .await
        .unwrap();

    // Carol never registered, but her node already holds a summary
    let to_bob = w.sync.compose(&carol(), w.bob.key(), MessageKind::text("hi bob"));
    let id = w
        .sync
        .create_conversation(&carol(), w.bob.key(), "Bob Example", &to_bob)
        .await
        .unwrap();

    assert_eq!(w.summaries(&carol()).await.len(), 2);
    let theirs = w.summaries(&w.bob).await;
    assert_eq!(theirs.len(), 1);
    assert_eq!(theirs[0]["id"], id.as_str());
    assert_eq!(theirs[0]["name"], "Carol Example");
    assert_eq!(w.messages(&id).await.len(), 1);
}

#[tokio::test]
async fn test_stranger_cannot_start_conversation() {
    let w = world(SyncConfig::default()).await;
    let hello = w.sync.compose(&carol(), w.bob.key(), MessageKind::text("hi"));

    assert!(matches!(
        w.sync
            .create_conversation(&carol(), w.bob.key(), "Bob Example", &hello)
            .await,
        Err(SyncError::UserNotFound(_))
    ));
    assert!(w.summaries(&w.bob).await.is_empty());
}

// ============================================================================
// Finding and deleting
// ============================================================================

#[tokio::test]
async fn test_find_existing_conversation() {
    let w = world(SyncConfig::default()).await;

    assert!(matches!(
        w.sync.find_existing_conversation(&w.alice, w.bob.key()).await,
        Err(SyncError::NoExistingConversation(_))
    ));

    let id = w.start("hi").await;
    assert_eq!(
        w.sync
            .find_existing_conversation(&w.alice, w.bob.key())
            .await
            .unwrap(),
        id
    );
    assert_eq!(
        w.sync
            .find_existing_conversation(&w.bob, w.alice.key())
            .await
            .unwrap(),
        id
    );
}

#[tokio::test]
async fn test_hide_is_one_sided() {
    let w = world(SyncConfig::default()).await;
    let id = w.start("hi").await;

    w.sync.delete_conversation(&w.alice, &id).await.unwrap();

    assert!(w.summaries(&w.alice).await.is_empty());
    assert_eq!(w.summaries(&w.bob).await.len(), 1);
    assert_eq!(w.messages(&id).await.len(), 1);

    // The user record itself survives losing its last summary.
    assert!(w.store.get(&TreePath::user(w.alice.key()).unwrap()).await.unwrap().exists());
}

#[tokio::test]
async fn test_delete_everywhere() {
    let w = world(SyncConfig::default()).await;
    let id = w.start("hi").await;

    w.sync
        .delete_conversation_everywhere(&w.alice, &id)
        .await
        .unwrap();

    assert!(w.summaries(&w.alice).await.is_empty());
    assert!(w.summaries(&w.bob).await.is_empty());
    assert!(w.messages(&id).await.is_empty());
    assert!(matches!(
        w.sync.fetch_messages(&id).await,
        Err(SyncError::ConversationNotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_everywhere_after_counterpart_hid() {
    let w = world(SyncConfig::default()).await;
    let id = w.start("hi").await;

    w.sync.hide_conversation(&w.bob, &id).await.unwrap();
    w.sync
        .delete_conversation_everywhere(&w.alice, &id)
        .await
        .unwrap();
    assert!(w.summaries(&w.alice).await.is_empty());
}

// ============================================================================
// Decoding stored records
// ============================================================================

#[tokio::test]
async fn test_location_records_decode_or_drop() {
    let w = world(SyncConfig::default()).await;
    let id = ConversationId::from_raw("conversation_manual");
    let record = |id: &str, content: &str| {
        json!({
            "id": id,
            "type": "location",
            "content": content,
            "date": "2020-09-01T15:04:05.000Z",
            "sender_email": "a-example-com",
            "is_read": false,
            "name": "Alice Example",
        })
    };
    w.store
        .set(
            &ConversationSync::messages_path(&id).unwrap(),
            json!([record("m1", "10.0,20.0"), record("m2", "bad")]),
        )
        .await
        .unwrap();

    let messages = w.sync.fetch_messages(&id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, MessageKind::location(10.0, 20.0));

    let batch = w.sync.fetch_message_records(&id).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.failures().count(), 1);
}
