//! Related-record watch event handling.

use std::collections::BTreeSet;
use std::sync::Arc;

use reconcile_core::{
    EventMapper, ReconcileContext, RecordKey, RelatedIdentity, RelatedRecord, Result, WatchEvent,
};
use tracing::debug;

/// Turns related-record watch events into managed-record keys.
///
/// Creations and deletions are always mapped. Updates are mapped only when
/// the related record actually changed.
pub struct RelatedEventHandler {
    mapper: Arc<dyn EventMapper>,
}

impl RelatedEventHandler {
    /// Create a handler around a mapper.
    pub fn new(mapper: Arc<dyn EventMapper>) -> Self {
        Self { mapper }
    }

    /// Whether an event should be mapped at all.
    pub fn should_map(event: &WatchEvent<RelatedRecord>) -> bool {
        match event {
            WatchEvent::Applied { old: None, .. } => true,
            WatchEvent::Applied { old: Some(old), new } => old != new,
            WatchEvent::Deleted(_) => true,
        }
    }

    /// Keys of the managed records to enqueue for this event.
    ///
    /// The result holds each key at most once.
    pub async fn handle(
        &self,
        ctx: &ReconcileContext,
        event: &WatchEvent<RelatedRecord>,
    ) -> Result<Vec<RecordKey>> {
        if !Self::should_map(event) {
            return Ok(Vec::new());
        }

        let identity = RelatedIdentity::from(event.object());
        let keys = ctx
            .run("map_event", self.mapper.map_event(ctx, &identity))
            .await?;

        let unique: BTreeSet<RecordKey> = keys.into_iter().collect();
        debug!(related = %identity.key, dependents = unique.len(), "related record changed");
        Ok(unique.into_iter().collect())
    }
}
