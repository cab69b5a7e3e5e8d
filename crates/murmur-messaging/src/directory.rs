//! User records and the global user directory

use std::sync::Arc;

use murmur_core::{CurrentUser, RemoteTreeStore, StorageKey, StoreError, TreePath};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::message::{DirectoryEntry, UserRecord};
use crate::update::{into_list, update_path};

/// Details of an account being registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl NewUser {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Reads and writes user records and the `/users` directory
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn RemoteTreeStore>,
    config: SyncConfig,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn RemoteTreeStore>, config: SyncConfig) -> Self {
        Self { store, config }
    }

    fn users_path(&self) -> SyncResult<TreePath> {
        Ok(TreePath::parse(&self.config.users_path)?)
    }

    /// Whether `email` has registered
    ///
    /// A node holding only conversations started by others does not count.
    pub async fn user_exists(&self, email: &str) -> SyncResult<bool> {
        let key = StorageKey::from_email(email)?;
        let path = TreePath::user(&key)?;
        Ok(match self.store.get(&path).await?.value {
            Some(value @ Value::Object(_)) => UserRecord::from_node(&path, value)
                .map(|record| record.is_registered())
                .unwrap_or(false),
            _ => false,
        })
    }

    /// Write the user's names and add them to the directory
    ///
    /// Existing conversations under the record are kept. The directory is
    /// append-only; registering twice lists the user twice.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn insert_user(&self, user: &NewUser) -> SyncResult<StorageKey> {
        let key = StorageKey::from_email(&user.email)?;

        let user_path = TreePath::user(&key)?;
        update_path(self.store.as_ref(), &user_path, &self.config.retry, |current| {
            let mut record = match current {
                Some(value) => UserRecord::from_node(&user_path, value)?,
                None => UserRecord::default(),
            };
            record.first_name = user.first_name.clone();
            record.last_name = user.last_name.clone();
            Ok((serde_json::to_value(record)?, ()))
        })
        .await?;
        debug!(key = %key, "Wrote user record");

        let entry = serde_json::to_value(DirectoryEntry {
            name: user.full_name(),
            email: key.to_string(),
        })?;
        let users_path = self.users_path()?;
        update_path(self.store.as_ref(), &users_path, &self.config.retry, |current| {
            let mut list = into_list(&users_path, current)?;
            list.push(entry.clone());
            Ok((Value::Array(list), ()))
        })
        .await?;

        info!(key = %key, "Registered user");
        Ok(key)
    }

    /// Register the user unless a record already exists
    ///
    /// Returns `true` if a new record was written.
    pub async fn ensure_user(&self, user: &NewUser) -> SyncResult<bool> {
        if self.user_exists(&user.email).await? {
            return Ok(false);
        }
        self.insert_user(user).await?;
        Ok(true)
    }

    /// The user's stored record
    pub async fn get_user(&self, key: &StorageKey) -> SyncResult<UserRecord> {
        self.store
            .get(&TreePath::user(key)?)
            .await?
            .decode::<UserRecord>()?
            .ok_or_else(|| SyncError::UserNotFound(key.to_string()))
    }

    /// Every directory entry
    ///
    /// # Errors
    ///
    /// [`StoreError::FetchFailed`] if the directory does not exist yet.
    pub async fn all_users(&self) -> SyncResult<Vec<DirectoryEntry>> {
        let path = self.users_path()?;
        let snapshot = self.store.get(&path).await?;
        if !snapshot.exists() {
            return Err(StoreError::fetch_failed(&path, "no user directory").into());
        }
        let entries = into_list(&path, snapshot.value)?
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();
        Ok(entries)
    }

    /// Directory entries whose name starts with `query`, ignoring case
    ///
    /// The caller is never part of the result.
    pub async fn search(&self, me: &CurrentUser, query: &str) -> SyncResult<Vec<DirectoryEntry>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let matches = self
            .all_users()
            .await?
            .into_iter()
            .filter(|entry| entry.email != me.key().as_str())
            .filter(|entry| entry.name.to_lowercase().starts_with(&query))
            .collect();
        Ok(matches)
    }

    /// Raw value at `path`
    ///
    /// # Errors
    ///
    /// [`StoreError::FetchFailed`] if the path holds no data.
    pub async fn get_data_for_path(&self, path: &str) -> SyncResult<Value> {
        let path = TreePath::parse(path)?;
        self.store
            .get(&path)
            .await?
            .value
            .ok_or_else(|| StoreError::fetch_failed(&path, "no data").into())
    }
}

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("users_path", &self.config.users_path)
            .finish_non_exhaustive()
    }
}
