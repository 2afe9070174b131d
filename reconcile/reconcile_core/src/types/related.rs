//! Related records.
//!
//! A related record is an upstream grouping that many managed records point
//! at through their [`RelatedRef`](crate::types::RelatedRef). Its changes can
//! require every dependent managed record to be reconciled again.

use serde::{Deserialize, Serialize};

use crate::id::{RecordKey, RelatedUid};

/// An upstream record that managed records depend on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedRecord {
    /// Cluster-scoped key.
    pub key: RecordKey,

    /// Uid assigned when the record was created.
    pub uid: RelatedUid,

    /// Whether the related record is ready to have dependents converged.
    #[serde(default)]
    pub active: bool,

    /// Opaque configuration shared by the dependents.
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl RelatedRecord {
    /// Create an inactive related record.
    pub fn new(name: impl Into<String>, spec: serde_json::Value) -> Self {
        Self {
            key: RecordKey::cluster_scoped(name),
            uid: RelatedUid::new(),
            active: false,
            spec,
        }
    }

    /// Mark the record active.
    pub fn activated(mut self) -> Self {
        self.active = true;
        self
    }

    /// The identity dependents are matched against.
    pub fn identity(&self) -> RelatedIdentity {
        RelatedIdentity::new(self.key.clone(), Some(self.uid))
    }
}

/// Identity of a related record as seen by the event mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelatedIdentity {
    /// Key of the related record.
    pub key: RecordKey,

    /// Uid, when known.
    pub uid: Option<RelatedUid>,
}

impl RelatedIdentity {
    /// Create an identity.
    pub fn new(key: RecordKey, uid: Option<RelatedUid>) -> Self {
        Self { key, uid }
    }

    /// Identity known only by key.
    pub fn named(key: RecordKey) -> Self {
        Self::new(key, None)
    }
}

impl From<&RelatedRecord> for RelatedIdentity {
    fn from(record: &RelatedRecord) -> Self {
        record.identity()
    }
}
