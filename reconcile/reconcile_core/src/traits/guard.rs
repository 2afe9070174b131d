//! Deletion-guard manager contract.

use async_trait::async_trait;

use crate::context::ReconcileContext;
use crate::error::StoreError;
use crate::types::ManagedRecord;

/// Adds and removes a controller's guard token on records.
///
/// Both operations are idempotent: adding a token the record already has,
/// or removing one it does not have, succeeds without touching the store.
#[async_trait]
pub trait GuardManager: Send + Sync {
    /// Make sure the record carries `token`.
    async fn add_guard(
        &self,
        ctx: &ReconcileContext,
        record: &ManagedRecord,
        token: &str,
    ) -> Result<(), StoreError>;

    /// Make sure the record no longer carries `token`.
    async fn remove_guard(
        &self,
        ctx: &ReconcileContext,
        record: &ManagedRecord,
        token: &str,
    ) -> Result<(), StoreError>;
}
