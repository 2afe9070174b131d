//! Related-record event mapper contract.

use async_trait::async_trait;

use crate::context::ReconcileContext;
use crate::error::StoreError;
use crate::id::RecordKey;
use crate::types::RelatedIdentity;

/// Maps a change on a related record to the managed records that depend
/// on it.
///
/// Mapping is read-only and reflects the reference relationships as they
/// are at call time. The result may be empty and its order carries no
/// meaning.
#[async_trait]
pub trait EventMapper: Send + Sync {
    /// Keys of every managed record that references `related`.
    async fn map_event(
        &self,
        ctx: &ReconcileContext,
        related: &RelatedIdentity,
    ) -> Result<Vec<RecordKey>, StoreError>;
}
