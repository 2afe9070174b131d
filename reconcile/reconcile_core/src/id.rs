//! Record identities.
//!
//! A [`RecordKey`] is the namespace + name pair a record is addressed by in
//! the store. It is what notifications carry and what the work queue
//! deduplicates on. A uid ([`RecordUid`], [`RelatedUid`]) is assigned once
//! when a record is created and distinguishes a record from a later one that
//! reuses the same key.
//!
//! # Examples
//!
//! ```
//! use reconcile_core::id::{RecordKey, RecordUid};
//! use std::str::FromStr;
//!
//! let key = RecordKey::new("default", "backend-v1");
//! assert_eq!(key.to_string(), "default/backend-v1");
//! assert_eq!(RecordKey::from_str("default/backend-v1").unwrap(), key);
//!
//! let uid = RecordUid::new();
//! assert!(!uid.is_nil());
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::{Ord, PartialOrd};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Namespace + name identity of a record in the store.
///
/// Cluster-scoped records (such as the related grouping records) use an
/// empty namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    #[serde(default)]
    namespace: String,
    name: String,
}

impl RecordKey {
    /// Create a namespaced key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a key for a cluster-scoped record.
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    /// The namespace, empty for cluster-scoped records.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this key addresses a cluster-scoped record.
    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Error returned when parsing a malformed [`RecordKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid record key: {0:?}")]
pub struct ParseKeyError(String);

impl FromStr for RecordKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = match s.split_once('/') {
            Some((namespace, name)) => (namespace, name),
            None => ("", s),
        };
        if name.is_empty() || name.contains('/') {
            return Err(ParseKeyError(s.to_string()));
        }
        Ok(Self::new(namespace, name))
    }
}

/// A type-safe uid based on UUID.
///
/// The phantom type parameter keeps managed-record uids and related-record
/// uids from being mixed up even though they share the same representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Id<T> {
    uuid: Uuid,
    #[serde(skip)]
    _marker: std::marker::PhantomData<T>,
}

impl<T> Id<T> {
    /// Create a new random uid.
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Create a uid from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Create a nil (all zeros) uid.
    pub fn nil() -> Self {
        Self::from_uuid(Uuid::nil())
    }

    /// Check if this is a nil uid.
    pub fn is_nil(&self) -> bool {
        self.uuid.is_nil()
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_uuid(Uuid::parse_str(s)?))
    }
}

/// Marker type for managed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordMarker;
/// Uid of a managed record.
pub type RecordUid = Id<RecordMarker>;

/// Marker type for related records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelatedMarker;
/// Uid of a related record.
pub type RelatedUid = Id<RelatedMarker>;
