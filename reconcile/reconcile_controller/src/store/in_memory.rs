//! In-memory managed-record store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use reconcile_core::{
    ManagedRecord, ReconcileContext, RecordKey, RecordStore, RelatedIdentity, RelatedRef,
    StoreError, WatchEvent,
};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::WATCH_CAPACITY;

/// An in-memory [`RecordStore`].
///
/// Records marked for deletion are removed as soon as their last guard
/// token goes away. A marked record does not accept new tokens.
pub struct InMemoryRecordStore {
    /// Records keyed by namespace and name
    records: DashMap<RecordKey, ManagedRecord>,

    /// Watch feed
    events: broadcast::Sender<WatchEvent<ManagedRecord>>,

    /// Reject guard token updates
    fail_guard_updates: AtomicBool,

    /// Reject reads
    fail_reads: AtomicBool,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            records: DashMap::new(),
            events,
            fail_guard_updates: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Subscribe to changes.
    pub fn watch(&self) -> broadcast::Receiver<WatchEvent<ManagedRecord>> {
        self.events.subscribe()
    }

    /// Insert a new record.
    pub fn create(&self, record: ManagedRecord) -> Result<ManagedRecord, StoreError> {
        if record.is_marked_for_deletion() {
            return Err(StoreError::Rejected(format!(
                "cannot create {} already marked for deletion",
                record.key
            )));
        }

        match self.records.entry(record.key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::AlreadyExists(record.key));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        debug!(key = %record.key, "record created");
        self.publish(WatchEvent::Applied {
            old: None,
            new: record.clone(),
        });
        Ok(record)
    }

    /// Replace the desired state. The generation moves on when it changes.
    pub fn update_spec(&self, key: &RecordKey, spec: Value) -> Result<ManagedRecord, StoreError> {
        self.modify(key, |record| {
            if record.spec != spec {
                record.spec = spec;
                record.generation += 1;
            }
            Ok(())
        })
    }

    /// Replace the observed state.
    pub fn update_status(
        &self,
        key: &RecordKey,
        status: Value,
    ) -> Result<ManagedRecord, StoreError> {
        self.modify(key, |record| {
            record.status = status;
            Ok(())
        })
    }

    /// Point a record at a related record, or detach it.
    pub fn set_related_ref(
        &self,
        key: &RecordKey,
        related_ref: Option<RelatedRef>,
    ) -> Result<ManagedRecord, StoreError> {
        self.modify(key, |record| {
            record.related_ref = related_ref;
            Ok(())
        })
    }

    /// Request removal of a record.
    ///
    /// The deletion marker is set once; later requests are no-ops. A record
    /// without guard tokens is removed immediately.
    pub fn mark_for_deletion(&self, key: &RecordKey) -> Result<(), StoreError> {
        let change = {
            let mut entry = self
                .records
                .get_mut(key)
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            if entry.is_marked_for_deletion() {
                None
            } else {
                let old = entry.value().clone();
                entry.deletion_marker = Some(Utc::now());
                Some((old, entry.value().clone()))
            }
        };

        if let Some((old, new)) = change {
            debug!(%key, tokens = new.guard_tokens.len(), "record marked for deletion");
            self.settle(old, new);
        }
        Ok(())
    }

    /// Current state of a record, if present.
    pub fn snapshot(&self, key: &RecordKey) -> Option<ManagedRecord> {
        self.records.get(key).map(|r| r.value().clone())
    }

    /// Whether a record is present.
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Make guard token updates fail with `Rejected`.
    pub fn fail_guard_updates(&self, fail: bool) {
        self.fail_guard_updates.store(fail, Ordering::SeqCst);
    }

    /// Make reads fail with `Unavailable`.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn modify<F>(&self, key: &RecordKey, f: F) -> Result<ManagedRecord, StoreError>
    where
        F: FnOnce(&mut ManagedRecord) -> Result<(), StoreError>,
    {
        let (old, new) = {
            let mut entry = self
                .records
                .get_mut(key)
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            let old = entry.value().clone();
            f(entry.value_mut())?;
            (old, entry.value().clone())
        };
        if old != new {
            self.publish(WatchEvent::Applied {
                old: Some(old),
                new: new.clone(),
            });
        }
        Ok(new)
    }

    /// Publish a change, removing the record if nothing holds it any more.
    fn settle(&self, old: ManagedRecord, new: ManagedRecord) {
        let removed = self
            .records
            .remove_if(&new.key, |_, r| r.is_removable())
            .is_some();

        if removed {
            debug!(key = %new.key, "record removed");
            self.publish(WatchEvent::Deleted(new));
        } else {
            self.publish(WatchEvent::Applied {
                old: Some(old),
                new,
            });
        }
    }

    fn publish(&self, event: WatchEvent<ManagedRecord>) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn check_guard_updates(&self) -> Result<(), StoreError> {
        if self.fail_guard_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("guard token update rejected".into()));
        }
        Ok(())
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store unavailable".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(
        &self,
        _ctx: &ReconcileContext,
        key: &RecordKey,
    ) -> Result<ManagedRecord, StoreError> {
        self.check_reads()?;
        self.snapshot(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn add_guard_token(
        &self,
        _ctx: &ReconcileContext,
        key: &RecordKey,
        token: &str,
    ) -> Result<(), StoreError> {
        self.check_guard_updates()?;
        self.modify(key, |record| {
            if record.has_guard_token(token) {
                return Ok(());
            }
            if record.is_marked_for_deletion() {
                return Err(StoreError::Conflict(format!(
                    "{} is marked for deletion",
                    record.key
                )));
            }
            record.guard_tokens.insert(token.to_string());
            Ok(())
        })
        .map(|_| ())
    }

    async fn remove_guard_token(
        &self,
        _ctx: &ReconcileContext,
        key: &RecordKey,
        token: &str,
    ) -> Result<(), StoreError> {
        self.check_guard_updates()?;
        let change = {
            let mut entry = self
                .records
                .get_mut(key)
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            if !entry.has_guard_token(token) {
                None
            } else {
                let old = entry.value().clone();
                entry.guard_tokens.remove(token);
                Some((old, entry.value().clone()))
            }
        };

        if let Some((old, new)) = change {
            self.settle(old, new);
        }
        Ok(())
    }

    async fn list(&self, _ctx: &ReconcileContext) -> Result<Vec<ManagedRecord>, StoreError> {
        self.check_reads()?;
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }

    async fn list_referencing(
        &self,
        _ctx: &ReconcileContext,
        related: &RelatedIdentity,
    ) -> Result<Vec<ManagedRecord>, StoreError> {
        self.check_reads()?;
        Ok(self
            .records
            .iter()
            .filter(|r| r.references(related))
            .map(|r| r.value().clone())
            .collect())
    }
}
