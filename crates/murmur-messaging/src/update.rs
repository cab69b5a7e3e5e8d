//! Whole-value read-modify-write against the tree store
//!
//! The store only replaces whole values, so every change to a list is a read,
//! an in-memory edit and a write of the full list. [`update_path`] runs that
//! cycle with a conditional write and retries when another writer changed the
//! path in between. With retries disabled it falls back to an unconditional
//! write, and the last writer wins.

use murmur_core::{RemoteTreeStore, TreePath};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{DecodeError, SyncError, SyncResult};

/// Read `path`, apply `mutate` to its current value and write the result back
///
/// `mutate` receives `None` when the path holds no data and returns the value
/// to write along with the caller's output. It may run more than once, so it
/// must not have side effects. An error from `mutate` aborts without writing.
pub async fn update_path<T, F>(
    store: &dyn RemoteTreeStore,
    path: &TreePath,
    retry: &RetryPolicy,
    mut mutate: F,
) -> SyncResult<T>
where
    F: FnMut(Option<Value>) -> SyncResult<(Value, T)>,
{
    if !retry.is_enabled() {
        let snapshot = store.get(path).await?;
        let (value, output) = mutate(snapshot.value)?;
        store.set(path, value).await?;
        debug!(path = %path, "Wrote path");
        return Ok(output);
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        let snapshot = store.get(path).await?;
        let (value, output) = mutate(snapshot.value)?;

        match store.set_if_version(path, value, &snapshot.version).await {
            Ok(_) => {
                debug!(path = %path, attempt, "Wrote path");
                return Ok(output);
            }
            Err(e) if e.is_conflict() => {
                if attempt >= retry.max_attempts {
                    warn!(path = %path, attempt, "Giving up after repeated conflicts");
                    return Err(SyncError::ConflictRetriesExhausted {
                        path: path.to_string(),
                        attempts: attempt,
                    });
                }
                let delay = retry.backoff(attempt);
                debug!(path = %path, attempt, ?delay, "Version conflict, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Interpret a stored value as a list; no data is an empty list
pub(crate) fn into_list(path: &TreePath, value: Option<Value>) -> Result<Vec<Value>, DecodeError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(DecodeError::Shape {
            path: path.to_string(),
            reason: format!("expected a list, found {}", json_type(&other)),
        }),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
