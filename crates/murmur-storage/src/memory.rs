//! In-memory tree store
//!
//! Holds the whole tree as one JSON value. Every committed write publishes
//! its path on a broadcast channel; observers re-read their own path when a
//! related path changes. Suitable for tests, simulation and the CLI demo.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use murmur_core::{RemoteTreeStore, Snapshot, SnapshotStream, StoreError, TreePath, Version};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::StorageError;
use crate::fault::{FaultOp, FaultPlan};

/// Default capacity of the change channel
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

struct Inner {
    root: RwLock<Value>,
    changes: broadcast::Sender<TreePath>,
    faults: FaultPlan,
    latency: Duration,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl Inner {
    fn snapshot(&self, path: &TreePath) -> Snapshot {
        let root = self.root.read();
        let value = value_at(&root, path).cloned();
        let version = version_of(value.as_ref());
        Snapshot::new(path.clone(), value, version)
    }
}

/// In-memory implementation of [`RemoteTreeStore`]
///
/// Cloning is cheap and clones share the same tree, the way two clients
/// share one backend.
#[derive(Clone)]
pub struct InMemoryTreeStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTreeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTreeStore")
            .field("reads", &self.read_count())
            .field("writes", &self.write_count())
            .finish()
    }
}

impl InMemoryTreeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Create a store that waits `latency` before serving each operation
    ///
    /// Lets concurrent read-modify-write cycles interleave the way they do
    /// against a real network backend.
    pub fn with_latency(latency: Duration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                root: RwLock::new(Value::Null),
                changes,
                faults: FaultPlan::new(),
                latency,
                reads: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Seed the tree from a JSON document
    pub fn load_json(&self, json: &str) -> Result<(), StorageError> {
        let value: Value = serde_json::from_str(json)?;
        *self.inner.root.write() = value;
        let _ = self.inner.changes.send(TreePath::root());
        Ok(())
    }

    /// Dump the whole tree
    pub fn export(&self) -> Value {
        self.inner.root.read().clone()
    }

    /// Fault injection hooks
    pub fn faults(&self) -> &FaultPlan {
        &self.inner.faults
    }

    /// Total reads served (including failed ones)
    pub fn read_count(&self) -> u64 {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Total writes attempted (including failed ones)
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if !self.inner.latency.is_zero() {
            tokio::time::sleep(self.inner.latency).await;
        }
    }

    fn commit(&self, path: &TreePath, value: Value) -> Result<Version, StoreError> {
        let version = {
            let mut root = self.inner.root.write();
            write_at(&mut root, path, value)?;
            version_of(value_at(&root, path))
        };
        debug!(path = %path, version = %version, "Committed write");
        // No receivers is not an error: nobody is observing.
        let _ = self.inner.changes.send(path.clone());
        Ok(version)
    }
}

#[async_trait]
impl RemoteTreeStore for InMemoryTreeStore {
    async fn get(&self, path: &TreePath) -> Result<Snapshot, StoreError> {
        self.delay().await;
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.faults.check(path, FaultOp::Read)?;

        let snapshot = self.inner.snapshot(path);
        trace!(path = %path, exists = snapshot.exists(), "Read path");
        Ok(snapshot)
    }

    async fn set(&self, path: &TreePath, value: Value) -> Result<Version, StoreError> {
        self.delay().await;
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.faults.check(path, FaultOp::Write)?;
        self.commit(path, value)
    }

    async fn set_if_version(
        &self,
        path: &TreePath,
        value: Value,
        expected: &Version,
    ) -> Result<Version, StoreError> {
        self.delay().await;
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.faults.check(path, FaultOp::Write)?;

        let version = {
            let mut root = self.inner.root.write();
            let current = version_of(value_at(&root, path));
            if current != *expected {
                debug!(path = %path, expected = %expected, current = %current, "Version conflict");
                return Err(StoreError::VersionConflict {
                    path: path.to_string(),
                });
            }
            write_at(&mut root, path, value)?;
            version_of(value_at(&root, path))
        };
        debug!(path = %path, version = %version, "Committed conditional write");
        let _ = self.inner.changes.send(path.clone());
        Ok(version)
    }

    fn observe(&self, path: &TreePath) -> SnapshotStream {
        // Subscribe before taking the first snapshot so no write slips between.
        let mut rx = self.inner.changes.subscribe();
        let inner = self.inner.clone();
        let path = path.clone();

        Box::pin(async_stream::stream! {
            let first = inner.snapshot(&path);
            let mut last = first.version.clone();
            yield first;

            loop {
                match rx.recv().await {
                    Ok(written) if !path.is_affected_by(&written) => continue,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let snapshot = inner.snapshot(&path);
                        if snapshot.version == last {
                            continue;
                        }
                        last = snapshot.version.clone();
                        yield snapshot;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Version tag: BLAKE3 of the canonical JSON encoding
///
/// `serde_json` maps are ordered, so equal values always hash equally.
pub fn version_of(value: Option<&Value>) -> Version {
    match value {
        None => Version::absent(),
        Some(v) => {
            let bytes = serde_json::to_vec(v).unwrap_or_default();
            Version::new(hex::encode(&blake3::hash(&bytes).as_bytes()[..16]))
        }
    }
}

fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn child_of<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn value_at<'a>(root: &'a Value, path: &TreePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = child_of(node, segment)?;
    }
    if is_empty_node(node) { None } else { Some(node) }
}

/// Replace the node at `path`, creating parents as needed
fn write_at(root: &mut Value, path: &TreePath, value: Value) -> Result<(), StoreError> {
    if is_empty_node(&value) {
        remove_at(root, path);
        return Ok(());
    }
    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for segment in parents {
        node = descend_mut(node, segment, path)?;
    }

    match node {
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => items[i] = value,
            Ok(i) if i == items.len() => items.push(value),
            _ => return Err(StoreError::write_failed(path, "cannot address array element")),
        },
        other => {
            if !other.is_object() {
                *other = Value::Object(Map::new());
            }
            if let Value::Object(map) = other {
                map.insert(last.clone(), value);
            }
        }
    }
    Ok(())
}

/// Remove the node at `path` and prune parents left empty
fn remove_at(root: &mut Value, path: &TreePath) {
    prune_along(root, path.segments());
    if is_empty_node(root) {
        *root = Value::Null;
    }
}

fn prune_along(node: &mut Value, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let emptied = match child_mut(node, first) {
        Some(child) if rest.is_empty() => {
            *child = Value::Null;
            true
        }
        Some(child) => {
            prune_along(child, rest);
            is_empty_node(child)
        }
        None => false,
    };
    if emptied {
        match node {
            Value::Object(map) => {
                map.remove(first);
            }
            Value::Array(items) => {
                if let Ok(i) = first.parse::<usize>()
                    && i < items.len()
                {
                    items[i] = Value::Null;
                }
            }
            _ => {}
        }
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(i) => items.get_mut(i),
            Err(_) => None,
        },
        _ => None,
    }
}

fn descend_mut<'a>(
    node: &'a mut Value,
    segment: &str,
    path: &TreePath,
) -> Result<&'a mut Value, StoreError> {
    if !node.is_array() && !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(i) if i < items.len() => Ok(&mut items[i]),
            _ => Err(StoreError::write_failed(path, "cannot address array element")),
        },
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        _ => Err(StoreError::write_failed(path, "parent is not a container")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn path(p: &str) -> TreePath {
        TreePath::parse(p).unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_path() {
        let store = InMemoryTreeStore::new();
        let snap = store.get(&path("a-example-com")).await.unwrap();
        assert!(!snap.exists());
        assert_eq!(snap.version, Version::absent());
    }

    #[tokio::test]
    async fn test_set_and_get_nested() {
        let store = InMemoryTreeStore::new();
        store
            .set(&path("a-example-com"), json!({"first_name": "A", "last_name": "Doe"}))
            .await
            .unwrap();
        store
            .set(&path("a-example-com/conversations"), json!([{"id": "c1"}]))
            .await
            .unwrap();

        let user = store.get(&path("a-example-com")).await.unwrap();
        let value = user.value.unwrap();
        assert_eq!(value["first_name"], "A");
        assert_eq!(value["conversations"][0]["id"], "c1");

        let first = store.get(&path("a-example-com/conversations/0/id")).await.unwrap();
        assert_eq!(first.value, Some(json!("c1")));
    }

    #[tokio::test]
    async fn test_null_removes_and_prunes() {
        let store = InMemoryTreeStore::new();
        store.set(&path("x/y/z"), json!(1)).await.unwrap();
        store.remove(&path("x/y/z")).await.unwrap();

        assert!(!store.get(&path("x")).await.unwrap().exists());
        assert_eq!(store.export(), Value::Null);
    }

    #[tokio::test]
    async fn test_version_changes_with_value() {
        let store = InMemoryTreeStore::new();
        let p = path("users");
        let v1 = store.set(&p, json!([{"name": "A"}])).await.unwrap();
        let again = store.get(&p).await.unwrap();
        assert_eq!(again.version, v1);

        let v2 = store.set(&p, json!([{"name": "B"}])).await.unwrap();
        assert_ne!(v1, v2);
    }

    #[tokio::test]
    async fn test_conditional_write_conflict() {
        let store = InMemoryTreeStore::new();
        let p = path("c/messages");
        let v1 = store.set(&p, json!(["m1"])).await.unwrap();

        store.set_if_version(&p, json!(["m1", "m2"]), &v1).await.unwrap();
        let err = store.set_if_version(&p, json!(["m1", "m3"]), &v1).await.unwrap_err();
        assert!(err.is_conflict());

        let snap = store.get(&p).await.unwrap();
        assert_eq!(snap.value, Some(json!(["m1", "m2"])));
    }

    #[tokio::test]
    async fn test_conditional_create_on_absent_path() {
        let store = InMemoryTreeStore::new();
        let p = path("fresh");
        store.set_if_version(&p, json!({"a": 1}), &Version::absent()).await.unwrap();
        assert!(store
            .set_if_version(&p, json!({"a": 2}), &Version::absent())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_injected_write_fault() {
        let store = InMemoryTreeStore::new();
        store.faults().fail_writes(path("b-example-com"), 1);

        let err = store.set(&path("b-example-com/conversations"), json!([1])).await;
        assert!(matches!(err, Err(StoreError::WriteFailed { .. })));
        assert!(store.set(&path("b-example-com/conversations"), json!([1])).await.is_ok());
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_observe_delivers_initial_and_related_changes() {
        let store = InMemoryTreeStore::new();
        let p = path("a-example-com/conversations");
        store.set(&p, json!([{"id": "c1"}])).await.unwrap();

        let mut stream = store.observe(&p);
        let first = stream.next().await.unwrap();
        assert_eq!(first.value, Some(json!([{"id": "c1"}])));

        // Unrelated write is not delivered; ancestor write is.
        store.set(&path("b-example-com"), json!({"first_name": "B"})).await.unwrap();
        store
            .set(&path("a-example-com"), json!({"conversations": [{"id": "c2"}]}))
            .await
            .unwrap();

        let next = stream.next().await.unwrap();
        assert_eq!(next.value, Some(json!([{"id": "c2"}])));
    }

    #[tokio::test]
    async fn test_shared_between_clones() {
        let store = InMemoryTreeStore::new();
        let other = store.clone();
        store.set(&path("k"), json!("v")).await.unwrap();
        assert_eq!(other.get(&path("k")).await.unwrap().value, Some(json!("v")));
    }

    #[test]
    fn test_load_json() {
        let store = InMemoryTreeStore::new();
        store.load_json(r#"{"users": [{"name": "A B", "email": "a-example-com"}]}"#).unwrap();
        assert_eq!(store.export()["users"][0]["name"], "A B");
        assert!(store.load_json("{").is_err());
    }
}
