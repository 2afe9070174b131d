//! Convergence engine contract.

use async_trait::async_trait;

use crate::context::ReconcileContext;
use crate::error::ConvergenceError;
use crate::types::ManagedRecord;

/// Provisions and removes the external state described by a record.
///
/// Both operations must be idempotent and safe to call again after a
/// partial failure.
#[async_trait]
pub trait ConvergenceEngine: Send + Sync {
    /// Make external state match `record.spec`.
    ///
    /// Called on every reconcile of an active, guarded record.
    async fn converge(
        &self,
        ctx: &ReconcileContext,
        record: &ManagedRecord,
    ) -> Result<(), ConvergenceError>;

    /// Remove whatever external state `converge` created for the record.
    ///
    /// Must succeed when `converge` never completed and when there is
    /// nothing left to remove.
    async fn teardown(
        &self,
        ctx: &ReconcileContext,
        record: &ManagedRecord,
    ) -> Result<(), ConvergenceError>;
}
