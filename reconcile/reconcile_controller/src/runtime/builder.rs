//! Controller builder.

use std::sync::Arc;

use reconcile_core::{
    ConfigError, ControllerConfig, ManagedRecord, RecordStore, RelatedRecord, Result, WatchEvent,
};
use tokio::sync::broadcast;

use super::controller::{Controller, RelatedSource};
use crate::mapper::RelatedEventHandler;
use crate::queue::WorkQueue;
use crate::reconciler::Reconciler;

/// Builds a [`Controller`] for one managed record kind.
pub struct ControllerBuilder {
    config: ControllerConfig,
    reconciler: Arc<Reconciler>,
    records: Option<broadcast::Receiver<WatchEvent<ManagedRecord>>>,
    related: Vec<RelatedSource>,
    resync: Option<Arc<dyn RecordStore>>,
}

impl ControllerBuilder {
    /// Start building a controller around a reconciler.
    pub fn new(config: ControllerConfig, reconciler: Arc<Reconciler>) -> Self {
        Self {
            config,
            reconciler,
            records: None,
            related: Vec::new(),
            resync: None,
        }
    }

    /// Watch the managed records. Every event enqueues the record's key.
    pub fn for_records(mut self, feed: broadcast::Receiver<WatchEvent<ManagedRecord>>) -> Self {
        self.records = Some(feed);
        self
    }

    /// Watch related records. Events are mapped to dependent records by
    /// `handler`.
    pub fn watches_related(
        mut self,
        feed: broadcast::Receiver<WatchEvent<RelatedRecord>>,
        handler: RelatedEventHandler,
    ) -> Self {
        self.related.push(RelatedSource { feed, handler });
        self
    }

    /// Store the controller lists to enqueue every record. Required.
    ///
    /// The list runs at startup, whenever a watch feed lags and drops
    /// events, and on every resync interval when one is configured.
    pub fn with_resync(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.resync = Some(store);
        self
    }

    /// Validate the configuration and build the controller.
    pub fn build(self) -> Result<Controller> {
        self.config.validate()?;

        let records = self.records.ok_or_else(|| {
            ConfigError::Invalid("no managed record watch feed configured".to_string())
        })?;
        let resync = self.resync.ok_or_else(|| {
            ConfigError::Invalid(
                "no resync store configured; lagged watch feeds could not be recovered"
                    .to_string(),
            )
        })?;
        let queue = WorkQueue::from_config(&self.config.backoff);

        Ok(Controller {
            config: self.config,
            reconciler: self.reconciler,
            queue,
            records,
            related: self.related,
            resync,
        })
    }
}
