//! In-memory store for related records.

use dashmap::DashMap;
use reconcile_core::{RecordKey, RelatedRecord, StoreError, WatchEvent};
use tokio::sync::broadcast;

use super::WATCH_CAPACITY;

/// An in-memory store of related records.
pub struct InMemoryRelatedStore {
    records: DashMap<RecordKey, RelatedRecord>,
    events: broadcast::Sender<WatchEvent<RelatedRecord>>,
}

impl InMemoryRelatedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            records: DashMap::new(),
            events,
        }
    }

    /// Subscribe to changes.
    pub fn watch(&self) -> broadcast::Receiver<WatchEvent<RelatedRecord>> {
        self.events.subscribe()
    }

    /// Create or replace a related record.
    pub fn apply(&self, record: RelatedRecord) -> RelatedRecord {
        let old = self.records.insert(record.key.clone(), record.clone());
        let _ = self.events.send(WatchEvent::Applied {
            old,
            new: record.clone(),
        });
        record
    }

    /// Flip the readiness flag of a related record.
    pub fn set_active(&self, key: &RecordKey, active: bool) -> Result<RelatedRecord, StoreError> {
        let mut record = self
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        record.active = active;
        Ok(self.apply(record))
    }

    /// Remove a related record.
    pub fn delete(&self, key: &RecordKey) -> Result<RelatedRecord, StoreError> {
        let (_, record) = self
            .records
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        let _ = self.events.send(WatchEvent::Deleted(record.clone()));
        Ok(record)
    }

    /// Current state of a related record.
    pub fn get(&self, key: &RecordKey) -> Option<RelatedRecord> {
        self.records.get(key).map(|r| r.value().clone())
    }
}

impl Default for InMemoryRelatedStore {
    fn default() -> Self {
        Self::new()
    }
}
