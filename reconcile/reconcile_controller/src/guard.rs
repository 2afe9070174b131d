//! Deletion-guard manager backed by the record store.

use std::sync::Arc;

use async_trait::async_trait;
use reconcile_core::{
    GuardManager, ManagedRecord, ReconcileContext, RecordStore, StoreError,
};
use tracing::debug;

/// Guard manager that patches tokens through a [`RecordStore`].
///
/// The fetched record is checked first so that an already satisfied request
/// never reaches the store.
pub struct StoreGuardManager {
    store: Arc<dyn RecordStore>,
}

impl StoreGuardManager {
    /// Create a guard manager over the given store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GuardManager for StoreGuardManager {
    async fn add_guard(
        &self,
        ctx: &ReconcileContext,
        record: &ManagedRecord,
        token: &str,
    ) -> Result<(), StoreError> {
        if self.store.has_guard_token(record, token) {
            return Ok(());
        }
        debug!(key = %record.key, token, "adding guard token");
        self.store.add_guard_token(ctx, &record.key, token).await
    }

    async fn remove_guard(
        &self,
        ctx: &ReconcileContext,
        record: &ManagedRecord,
        token: &str,
    ) -> Result<(), StoreError> {
        if !self.store.has_guard_token(record, token) {
            return Ok(());
        }
        debug!(key = %record.key, token, "removing guard token");
        self.store.remove_guard_token(ctx, &record.key, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use reconcile_core::RecordKey;
    use serde_json::json;
    use std::time::Duration;

    const TOKEN: &str = "reconcile.io/resources";

    fn ctx() -> ReconcileContext {
        ReconcileContext::detached(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_add_guard_is_idempotent() {
        let store = Arc::new(InMemoryRecordStore::new());
        let key = RecordKey::new("ns", "vn");
        store
            .create(ManagedRecord::new(key.clone(), json!({})))
            .unwrap();
        let guards = StoreGuardManager::new(store.clone());

        let record = store.get(&ctx(), &key).await.unwrap();
        guards.add_guard(&ctx(), &record, TOKEN).await.unwrap();
        let after_first = store.get(&ctx(), &key).await.unwrap();
        assert!(after_first.has_guard_token(TOKEN));

        // Adding against the updated record does not touch the store.
        store.fail_guard_updates(true);
        guards.add_guard(&ctx(), &after_first, TOKEN).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_absent_guard_is_noop() {
        let store = Arc::new(InMemoryRecordStore::new());
        let key = RecordKey::new("ns", "vn");
        store
            .create(ManagedRecord::new(key.clone(), json!({})))
            .unwrap();
        let guards = StoreGuardManager::new(store.clone());

        store.fail_guard_updates(true);
        let record = store.get(&ctx(), &key).await.unwrap();
        guards.remove_guard(&ctx(), &record, TOKEN).await.unwrap();
    }
}
