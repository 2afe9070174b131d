//! Managed records.
//!
//! A managed record is the desired-state object the controller reconciles.
//! The controller only interprets its lifecycle fields: the key, the
//! deletion marker and the guard tokens. `spec` and `status` belong to the
//! convergence engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::id::{RecordKey, RecordUid, RelatedUid};
use crate::types::related::RelatedIdentity;

/// Weak reference from a managed record to the related record it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedRef {
    /// Name of the related record.
    pub name: String,

    /// Uid of the related record, when the reference is pinned to one
    /// incarnation of it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<RelatedUid>,
}

impl RelatedRef {
    /// Reference a related record by name only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: None,
        }
    }

    /// Pin the reference to a specific related record.
    pub fn with_uid(mut self, uid: RelatedUid) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Key of the referenced record.
    pub fn key(&self) -> RecordKey {
        RecordKey::cluster_scoped(self.name.clone())
    }

    /// Whether this reference points at the given related record.
    ///
    /// Names must be equal. Uids are only compared when both sides carry one.
    pub fn matches(&self, related: &RelatedIdentity) -> bool {
        if self.name != related.key.name() {
            return false;
        }
        match (&self.uid, &related.uid) {
            (Some(pinned), Some(actual)) => pinned == actual,
            _ => true,
        }
    }
}

/// A desired-state record under reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedRecord {
    /// Namespace + name identity, stable for the record's lifetime.
    pub key: RecordKey,

    /// Uid assigned when the record was created.
    pub uid: RecordUid,

    /// Incremented by the store whenever `spec` changes.
    #[serde(default)]
    pub generation: u64,

    /// Set once when removal is requested; never unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_marker: Option<DateTime<Utc>>,

    /// Guard tokens holding the record in the store.
    #[serde(default)]
    pub guard_tokens: BTreeSet<String>,

    /// The related record this one belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_ref: Option<RelatedRef>,

    /// Desired state, owned by the convergence engine.
    #[serde(default)]
    pub spec: serde_json::Value,

    /// Observed state, owned by the convergence engine.
    #[serde(default)]
    pub status: serde_json::Value,
}

impl ManagedRecord {
    /// Create a record with the given desired state.
    pub fn new(key: RecordKey, spec: serde_json::Value) -> Self {
        Self {
            key,
            uid: RecordUid::new(),
            generation: 1,
            deletion_marker: None,
            guard_tokens: BTreeSet::new(),
            related_ref: None,
            spec,
            status: serde_json::Value::Null,
        }
    }

    /// Attach a reference to a related record.
    pub fn with_related_ref(mut self, related_ref: RelatedRef) -> Self {
        self.related_ref = Some(related_ref);
        self
    }

    /// Whether removal of this record has been requested.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.deletion_marker.is_some()
    }

    /// Whether the record carries the given guard token.
    pub fn has_guard_token(&self, token: &str) -> bool {
        self.guard_tokens.contains(token)
    }

    /// Whether the store may physically remove this record.
    pub fn is_removable(&self) -> bool {
        self.is_marked_for_deletion() && self.guard_tokens.is_empty()
    }

    /// Whether this record references the given related record.
    pub fn references(&self, related: &RelatedIdentity) -> bool {
        self.related_ref
            .as_ref()
            .map(|r| r.matches(related))
            .unwrap_or(false)
    }
}
