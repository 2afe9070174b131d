//! Record store contract.

use async_trait::async_trait;

use crate::context::ReconcileContext;
use crate::error::StoreError;
use crate::id::RecordKey;
use crate::types::{ManagedRecord, RelatedIdentity};

/// The declarative-record store.
///
/// Implementations must enforce the removal invariant themselves: a record
/// whose deletion marker is set is physically removed as soon as its last
/// guard token is removed, and never while any token remains.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the current state of a record.
    ///
    /// # Returns
    ///
    /// * `Ok(ManagedRecord)` - The record as currently stored.
    /// * `Err(StoreError::NotFound)` - If the record does not exist.
    async fn get(
        &self,
        ctx: &ReconcileContext,
        key: &RecordKey,
    ) -> Result<ManagedRecord, StoreError>;

    /// Add a guard token to a record. Adding a present token is a no-op.
    async fn add_guard_token(
        &self,
        ctx: &ReconcileContext,
        key: &RecordKey,
        token: &str,
    ) -> Result<(), StoreError>;

    /// Remove a guard token from a record. Removing an absent token is a
    /// no-op.
    async fn remove_guard_token(
        &self,
        ctx: &ReconcileContext,
        key: &RecordKey,
        token: &str,
    ) -> Result<(), StoreError>;

    /// List every record currently in the store.
    async fn list(&self, ctx: &ReconcileContext) -> Result<Vec<ManagedRecord>, StoreError>;

    /// List the records whose related reference points at `related`.
    ///
    /// The default filters [`RecordStore::list`]; stores with an index
    /// should override it.
    async fn list_referencing(
        &self,
        ctx: &ReconcileContext,
        related: &RelatedIdentity,
    ) -> Result<Vec<ManagedRecord>, StoreError> {
        Ok(self
            .list(ctx)
            .await?
            .into_iter()
            .filter(|record| record.references(related))
            .collect())
    }

    /// Whether a fetched record carries the given guard token.
    fn has_guard_token(&self, record: &ManagedRecord, token: &str) -> bool {
        record.has_guard_token(token)
    }
}
