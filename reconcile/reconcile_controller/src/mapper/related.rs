//! Store-backed event mapper.

use std::sync::Arc;

use async_trait::async_trait;
use reconcile_core::{
    EventMapper, ReconcileContext, RecordKey, RecordStore, RelatedIdentity, StoreError,
};
use tracing::trace;

/// A mapper that asks the record store for the records whose related
/// reference matches.
pub struct StoreRelatedMapper {
    /// The record store.
    store: Arc<dyn RecordStore>,
}

impl StoreRelatedMapper {
    /// Create a new mapper.
    ///
    /// # Arguments
    ///
    /// * `store` - The store holding the managed records.
    ///
    /// # Returns
    ///
    /// A new mapper.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventMapper for StoreRelatedMapper {
    async fn map_event(
        &self,
        ctx: &ReconcileContext,
        related: &RelatedIdentity,
    ) -> Result<Vec<RecordKey>, StoreError> {
        let keys: Vec<RecordKey> = self
            .store
            .list_referencing(ctx, related)
            .await?
            .into_iter()
            .map(|record| record.key)
            .collect();

        trace!(related = %related.key, dependents = keys.len(), "mapped related record");
        Ok(keys)
    }
}
