//! The controller run loop.

use std::sync::Arc;
use std::time::Duration;

use reconcile_core::{
    ControllerConfig, Error, ManagedRecord, ReconcileContext, RecordKey, RecordStore,
    RelatedRecord, Result, WatchEvent,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::mapper::RelatedEventHandler;
use crate::queue::WorkQueue;
use crate::reconciler::{ReconcileOutcome, Reconciler};

/// Delay before a failed relist is attempted again.
const RELIST_RETRY: Duration = Duration::from_secs(1);

/// A related-record feed together with the handler mapping its events.
pub(crate) struct RelatedSource {
    pub(crate) feed: broadcast::Receiver<WatchEvent<RelatedRecord>>,
    pub(crate) handler: RelatedEventHandler,
}

/// A configured controller, ready to run.
///
/// Built by [`ControllerBuilder`](super::ControllerBuilder).
pub struct Controller {
    pub(crate) config: ControllerConfig,
    pub(crate) reconciler: Arc<Reconciler>,
    pub(crate) queue: WorkQueue<RecordKey>,
    pub(crate) records: broadcast::Receiver<WatchEvent<ManagedRecord>>,
    pub(crate) related: Vec<RelatedSource>,
    pub(crate) resync: Arc<dyn RecordStore>,
}

impl Controller {
    /// The controller's work queue.
    pub fn queue(&self) -> &WorkQueue<RecordKey> {
        &self.queue
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Every stored record is enqueued at startup. A watch feed that lags
    /// behind and drops events triggers an immediate relist, so no change
    /// goes unreconciled.
    ///
    /// On shutdown the queue stops accepting keys and in-flight reconciles
    /// get `shutdown_timeout_secs` to finish. Whatever is still running
    /// after that is cancelled and the call fails with [`Error::Timeout`].
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let Controller {
            config,
            reconciler,
            queue,
            records,
            related,
            resync,
        } = self;

        info!(
            controller = %config.name,
            workers = config.max_concurrent_reconciles,
            related_feeds = related.len(),
            "starting controller"
        );

        // Watch and list calls stop with the controller.
        let sources_ctx = ReconcileContext::new(shutdown.clone(), config.call_timeout());
        let relist = Arc::new(Notify::new());

        let mut sources = JoinSet::new();
        sources.spawn(watch_records(
            records,
            queue.clone(),
            relist.clone(),
            shutdown.clone(),
        ));
        for source in related {
            sources.spawn(watch_related(
                source,
                queue.clone(),
                relist.clone(),
                sources_ctx.clone(),
            ));
        }
        sources.spawn(resync_records(
            resync,
            queue.clone(),
            config.resync_interval(),
            relist,
            sources_ctx,
        ));

        // In-flight calls are cancelled through this context only once the
        // shutdown grace period has run out.
        let calls = CancellationToken::new();
        let workers_ctx = ReconcileContext::new(calls.clone(), config.call_timeout());
        let mut workers = JoinSet::new();
        for id in 0..config.max_concurrent_reconciles {
            workers.spawn(run_worker(
                id,
                reconciler.clone(),
                queue.clone(),
                shutdown.clone(),
                workers_ctx.clone(),
            ));
        }

        shutdown.cancelled().await;
        info!(controller = %config.name, "shutdown requested");
        queue.shut_down();
        sources.abort_all();

        let grace = config.shutdown_timeout();
        let drained = timeout(grace, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "worker task failed");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(controller = %config.name, ?grace, "workers still busy, cancelling");
            calls.cancel();
            workers.abort_all();
            return Err(Error::Timeout {
                operation: "shutdown",
                after: grace,
            });
        }

        info!(controller = %config.name, "controller stopped");
        Ok(())
    }
}

async fn run_worker(
    id: usize,
    reconciler: Arc<Reconciler>,
    queue: WorkQueue<RecordKey>,
    shutdown: CancellationToken,
    worker_ctx: ReconcileContext,
) {
    debug!(worker = id, "worker started");
    while let Some(key) = queue.get().await {
        // Keys still queued at shutdown are dropped.
        if shutdown.is_cancelled() {
            queue.done(&key);
            continue;
        }

        let ctx = worker_ctx.child();
        let outcome = reconciler.reconcile(&ctx, &key).await;
        apply_outcome(&queue, &key, outcome);
        queue.done(&key);
    }
    debug!(worker = id, "worker stopped");
}

/// Feed the result of one reconcile back into the queue.
fn apply_outcome(queue: &WorkQueue<RecordKey>, key: &RecordKey, outcome: Result<ReconcileOutcome>) {
    let requeued = match outcome {
        Ok(ReconcileOutcome::Done) => {
            queue.forget(key);
            Ok(())
        }
        Ok(ReconcileOutcome::Requeue) => queue.add_rate_limited(key.clone()),
        Ok(ReconcileOutcome::RequeueAfter(delay)) => {
            queue.forget(key);
            queue.add_after(key.clone(), delay)
        }
        Err(Error::Cancelled(operation)) => {
            debug!(%key, operation, "reconcile cancelled");
            Ok(())
        }
        Err(e) => {
            error!(%key, error = %e, attempts = queue.num_requeues(key), "reconcile failed");
            queue.add_rate_limited(key.clone())
        }
    };

    if let Err(e) = requeued {
        debug!(%key, error = %e, "not requeued");
    }
}

async fn watch_records(
    mut feed: broadcast::Receiver<WatchEvent<ManagedRecord>>,
    queue: WorkQueue<RecordKey>,
    relist: Arc<Notify>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = feed.recv() => event,
        };

        match event {
            Ok(event) => {
                if queue.add(event.key().clone()).is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "managed record feed lagged, relisting");
                relist.notify_one();
            }
            Err(RecvError::Closed) => {
                debug!("managed record feed closed");
                break;
            }
        }
    }
}

async fn watch_related(
    source: RelatedSource,
    queue: WorkQueue<RecordKey>,
    relist: Arc<Notify>,
    ctx: ReconcileContext,
) {
    let RelatedSource { mut feed, handler } = source;
    loop {
        let event = tokio::select! {
            _ = ctx.cancellation().cancelled() => break,
            event = feed.recv() => event,
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                // The dropped events cannot be mapped any more; requeue
                // every managed record instead.
                warn!(missed, "related record feed lagged, relisting");
                relist.notify_one();
                continue;
            }
            Err(RecvError::Closed) => {
                debug!("related record feed closed");
                break;
            }
        };

        match handler.handle(&ctx.child(), &event).await {
            Ok(keys) => {
                for key in keys {
                    if queue.add(key).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(related = %event.key(), error = %e, "failed to map related record event");
            }
        }
    }
}

/// List the store and enqueue every record, once at startup and then on
/// each resync tick or relist request.
async fn resync_records(
    store: Arc<dyn RecordStore>,
    queue: WorkQueue<RecordKey>,
    interval: Option<Duration>,
    relist: Arc<Notify>,
    ctx: ReconcileContext,
) {
    let mut ticker =
        interval.map(|period| tokio::time::interval_at(Instant::now() + period, period));

    loop {
        let list_ctx = ctx.child();
        let listed = match list_ctx.run("list", store.list(&list_ctx)).await {
            Ok(records) => {
                debug!(count = records.len(), "enqueueing all records");
                for record in records {
                    if queue.add(record.key).is_err() {
                        return;
                    }
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "listing records failed");
                false
            }
        };

        let tick = async {
            match ticker.as_mut() {
                Some(ticker) => {
                    ticker.tick().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = ctx.cancellation().cancelled() => break,
            _ = tick => debug!("periodic resync"),
            _ = relist.notified() => debug!("relist requested"),
            _ = tokio::time::sleep(RELIST_RETRY), if !listed => debug!("retrying list"),
        }
    }
}
