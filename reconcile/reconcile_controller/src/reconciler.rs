//! The lifecycle decision procedure.
//!
//! [`Reconciler::reconcile`] performs exactly one attempt per invocation:
//!
//! | State                    | Action                                      |
//! |--------------------------|---------------------------------------------|
//! | absent                   | nothing                                     |
//! | active, unguarded        | add guard token, then converge              |
//! | active, guarded          | converge                                    |
//! | pending delete, guarded  | tear down, then remove guard token          |
//! | pending delete, unguarded| nothing                                     |
//!
//! The guard token is only ever removed right after a teardown that
//! succeeded in the same invocation. Retrying is the caller's business.

use std::sync::Arc;
use std::time::Duration;

use reconcile_core::{
    ControllerConfig, ConvergenceEngine, ConvergenceError, DiagnosticSink, Error, GuardManager,
    LifecycleState, ManagedRecord, ReconcileContext, RecordKey, RecordStore, Result, Severity,
};
use tracing::{debug, field, info, info_span, Instrument, Span};

/// Diagnostic reason for a failure while converging an active record.
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";

/// Diagnostic reason for a failure while cleaning up a deleted record.
pub const REASON_CLEANUP_ERROR: &str = "CleanupError";

/// What the scheduler should do after a successful invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record is converged; forget its retry history.
    Done,

    /// Run again, subject to the scheduler's backoff.
    Requeue,

    /// Run again after the given delay.
    RequeueAfter(Duration),
}

/// Translate an explicit requeue request into an outcome.
///
/// Requeue requests are progress, not failures, so they come back as `Ok`.
/// Every other error is returned untouched for the scheduler to retry.
pub fn handle_reconcile_error(result: Result<()>) -> Result<ReconcileOutcome> {
    match result {
        Ok(()) => Ok(ReconcileOutcome::Done),
        Err(Error::Convergence(ConvergenceError::RequeueNeeded { reason, after })) => {
            debug!(%reason, ?after, "requeue needed");
            Ok(match after {
                Some(delay) => ReconcileOutcome::RequeueAfter(delay),
                None => ReconcileOutcome::Requeue,
            })
        }
        Err(e) => Err(e),
    }
}

/// Reconciles one managed record kind.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    guards: Arc<dyn GuardManager>,
    engine: Arc<dyn ConvergenceEngine>,
    diagnostics: Arc<dyn DiagnosticSink>,
    guard_token: String,
}

impl Reconciler {
    /// Create a reconciler from its collaborators.
    pub fn new(
        config: &ControllerConfig,
        store: Arc<dyn RecordStore>,
        guards: Arc<dyn GuardManager>,
        engine: Arc<dyn ConvergenceEngine>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            store,
            guards,
            engine,
            diagnostics,
            guard_token: config.guard_token.clone(),
        }
    }

    /// The guard token this reconciler owns.
    pub fn guard_token(&self) -> &str {
        &self.guard_token
    }

    /// Drive the record with the given key one step through its lifecycle.
    pub async fn reconcile(
        &self,
        ctx: &ReconcileContext,
        key: &RecordKey,
    ) -> Result<ReconcileOutcome> {
        let span = info_span!("reconcile", %key, state = field::Empty);
        handle_reconcile_error(self.reconcile_record(ctx, key).instrument(span).await)
    }

    async fn reconcile_record(&self, ctx: &ReconcileContext, key: &RecordKey) -> Result<()> {
        let record = match ctx.run("get", self.store.get(ctx, key)).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                debug!("record not found, nothing to do");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let state = LifecycleState::classify(&record, &self.guard_token);
        Span::current().record("state", state.as_str());
        debug!(generation = record.generation, "classified record");

        match state {
            LifecycleState::ActiveUnguarded | LifecycleState::ActiveGuarded => self
                .converge_record(ctx, &record)
                .await
                .map_err(|e| self.report(&record, REASON_RECONCILE_ERROR, e)),
            LifecycleState::PendingDeleteGuarded => self
                .cleanup_record(ctx, &record)
                .await
                .map_err(|e| self.report(&record, REASON_CLEANUP_ERROR, e)),
            LifecycleState::PendingDeleteUnguarded => Ok(()),
        }
    }

    async fn converge_record(&self, ctx: &ReconcileContext, record: &ManagedRecord) -> Result<()> {
        ctx.run(
            "add_guard",
            self.guards.add_guard(ctx, record, &self.guard_token),
        )
        .await?;
        ctx.run("converge", self.engine.converge(ctx, record))
            .await?;
        Ok(())
    }

    async fn cleanup_record(&self, ctx: &ReconcileContext, record: &ManagedRecord) -> Result<()> {
        ctx.run("teardown", self.engine.teardown(ctx, record))
            .await?;
        ctx.run(
            "remove_guard",
            self.guards.remove_guard(ctx, record, &self.guard_token),
        )
        .await?;
        info!("external state torn down, guard released");
        Ok(())
    }

    /// Attach a warning to the record. Cancellation is not a failure of the
    /// record and is only logged.
    fn report(&self, record: &ManagedRecord, reason: &str, err: Error) -> Error {
        if let Error::Cancelled(operation) = err {
            debug!(operation, "invocation cancelled");
            return err;
        }
        self.diagnostics
            .emit(record, Severity::Warning, reason, &err.to_string());
        err
    }
}
