//! Watch feed events.
//!
//! Stores publish one event per mutation. The controller runtime turns them
//! into work queue entries; it never acts on the payload directly because
//! every reconcile re-reads the record.

use crate::id::RecordKey;
use crate::types::record::ManagedRecord;
use crate::types::related::RelatedRecord;

/// Records that can travel on a watch feed.
pub trait Keyed {
    /// The record's key.
    fn key(&self) -> &RecordKey;
}

impl Keyed for ManagedRecord {
    fn key(&self) -> &RecordKey {
        &self.key
    }
}

impl Keyed for RelatedRecord {
    fn key(&self) -> &RecordKey {
        &self.key
    }
}

/// A change notification for a record of type `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T> {
    /// The record was created (`old` is `None`) or updated.
    Applied {
        /// The previous state, if the record existed.
        old: Option<T>,

        /// The new state.
        new: T,
    },

    /// The record was physically removed; carries its final state.
    Deleted(T),
}

impl<T: Keyed> WatchEvent<T> {
    /// Key of the record the event is about.
    pub fn key(&self) -> &RecordKey {
        self.object().key()
    }

    /// The latest known state of the record.
    pub fn object(&self) -> &T {
        match self {
            Self::Applied { new, .. } => new,
            Self::Deleted(last) => last,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_key() {
        let record = ManagedRecord::new(RecordKey::new("ns", "vn"), json!({}));
        let created = WatchEvent::Applied {
            old: None,
            new: record.clone(),
        };
        assert_eq!(created.key(), &record.key);

        let deleted = WatchEvent::Deleted(record.clone());
        assert_eq!(deleted.object(), &record);
    }
}
