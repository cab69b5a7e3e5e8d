//! User identity abstractions
//!
//! Users are addressed by email, but email addresses are not legal path
//! segments in the tree store. [`StorageKey`] is the storage-safe form,
//! produced by replacing `.` and `@` with [`KEY_SEPARATOR`].
//!
//! The mapping is not injective. Addresses that already contain the
//! separator collide with their dotted forms, which
//! [`StorageKey::from_email_strict`] rejects. Because `.` and `@` share one
//! separator, `a.b@example.com` and `a@b.example.com` also collide; no
//! per-address check can catch that. The lenient [`StorageKey::from_email`]
//! matches what existing clients write.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Character substituted for `.` and `@` in storage keys
pub const KEY_SEPARATOR: char = '-';

/// Characters legal in an email local part but not in a tree path segment
const UNSAFE_KEY_CHARS: [char; 5] = ['/', '#', '$', '[', ']'];

/// Storage-safe key derived from an email address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    /// Derive a key from an email address
    pub fn from_email(email: &str) -> Result<Self, IdentityError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(IdentityError::MissingEmail);
        }
        if !email.contains('@') || email.contains(UNSAFE_KEY_CHARS) {
            return Err(IdentityError::InvalidEmail(email.to_string()));
        }
        Ok(Self(to_storage_key(email)))
    }

    /// Derive a key, rejecting addresses that would make the mapping ambiguous
    pub fn from_email_strict(email: &str) -> Result<Self, IdentityError> {
        if email.contains(KEY_SEPARATOR) {
            return Err(IdentityError::AmbiguousEmail(email.trim().to_string()));
        }
        Self::from_email(email)
    }

    /// Wrap a key that is already storage-safe (e.g. read back from the store)
    pub fn from_raw(key: impl Into<String>) -> Result<Self, IdentityError> {
        let key = key.into();
        if key.is_empty() || key.contains(['.', '@']) || key.contains(UNSAFE_KEY_CHARS) {
            return Err(IdentityError::InvalidKey(key));
        }
        Ok(Self(key))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name used for this user's profile picture
    pub fn profile_picture_filename(&self) -> String {
        format!("{}_profile_picture.png", self.0)
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StorageKey {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_raw(value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0
    }
}

/// Pure `.`/`@` substitution used by [`StorageKey`]
pub fn to_storage_key(email: &str) -> String {
    email
        .chars()
        .map(|c| if c == '.' || c == '@' { KEY_SEPARATOR } else { c })
        .collect()
}

/// The signed-in user on whose behalf an engine call runs
///
/// Every engine operation takes this explicitly instead of reading it from
/// process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    email: String,
    key: StorageKey,
    display_name: String,
}

impl CurrentUser {
    /// Build the caller identity; both fields are required
    pub fn new(email: &str, display_name: &str) -> Result<Self, IdentityError> {
        let key = StorageKey::from_email(email)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(IdentityError::MissingDisplayName);
        }
        Ok(Self {
            email: email.trim().to_string(),
            key,
            display_name: display_name.to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl Display for CurrentUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.display_name, self.key)
    }
}
