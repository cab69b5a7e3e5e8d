//! Path-addressed tree values
//!
//! The remote store is a single JSON tree addressed by slash-separated
//! paths. A [`Snapshot`] is the whole value found at one path together with
//! the [`Version`] tag the store computed for it.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::identity::StorageKey;

/// Characters a path segment may not contain
const FORBIDDEN: [char; 6] = ['.', '#', '$', '[', ']', '/'];

/// A validated slash-separated path into the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// The root of the tree
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path such as `a-example-com/conversations`
    ///
    /// Leading and trailing slashes are ignored; empty inner segments are not.
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut out = Self::root();
        for segment in trimmed.split('/') {
            out = out.child(segment)?;
        }
        Ok(out)
    }

    /// Append one segment
    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        if segment.is_empty() || segment.contains(FORBIDDEN) {
            return Err(StoreError::InvalidPath(format!("{}/{}", self, segment)));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Path of a user's record
    pub fn user(key: &StorageKey) -> Result<Self, StoreError> {
        Self::root().child(key.as_str())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The parent path, or `None` at the root
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True if `self` is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &TreePath) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments.starts_with(&self.segments)
    }

    /// True if a write at `written` changes the value visible at `self`
    pub fn is_affected_by(&self, written: &TreePath) -> bool {
        self == written || self.is_ancestor_of(written) || written.is_ancestor_of(self)
    }
}

impl Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for TreePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TreePath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.to_string()
    }
}

/// Opaque version tag (ETag) of the value stored at a path
///
/// Two reads of an unchanged value yield equal tags. The store decides how
/// tags are computed; callers only compare them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Tag for a path that holds no value
    pub fn absent() -> Self {
        Self("null_etag".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The value at a path at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: TreePath,
    pub value: Option<Value>,
    pub version: Version,
}

impl Snapshot {
    pub fn new(path: TreePath, value: Option<Value>, version: Version) -> Self {
        Self {
            path,
            value,
            version,
        }
    }

    /// Whether the path holds any data
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// Deserialize the value, `Ok(None)` if the path is empty
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.value
            .as_ref()
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
    }
}
