//! Reconcile Controller
//!
//! A finalizer-guarded reconciliation controller for one managed record
//! kind. Given the key of a record, the [`Reconciler`] re-reads it from the
//! store and drives it one step through its lifecycle:
//!
//! - an active record gets this controller's guard token, then is converged;
//! - a record marked for deletion is torn down, and only after a successful
//!   teardown is the guard token released so the store can remove it.
//!
//! Changes on related records reach the same loop through the
//! [`RelatedEventHandler`], which maps them to the keys of dependent records.
//! The [`Controller`] runtime wires the watch feeds, the [`WorkQueue`] and a
//! bounded pool of workers together.
//!
//! # Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reconcile_controller::{
//!     ControllerBuilder, InMemoryRecordStore, InMemoryRelatedStore, Reconciler,
//!     RelatedEventHandler, StoreGuardManager, StoreRelatedMapper, TracingDiagnosticSink,
//! };
//! use reconcile_core::{ControllerConfig, ConvergenceEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run(engine: Arc<dyn ConvergenceEngine>) -> reconcile_core::Result<()> {
//!     let config = ControllerConfig::default();
//!     let records = Arc::new(InMemoryRecordStore::new());
//!     let related = Arc::new(InMemoryRelatedStore::new());
//!
//!     let reconciler = Reconciler::new(
//!         &config,
//!         records.clone(),
//!         Arc::new(StoreGuardManager::new(records.clone())),
//!         engine,
//!         Arc::new(TracingDiagnosticSink::new()),
//!     );
//!     let handler = RelatedEventHandler::new(Arc::new(StoreRelatedMapper::new(records.clone())));
//!
//!     let controller = ControllerBuilder::new(config, Arc::new(reconciler))
//!         .for_records(records.watch())
//!         .watches_related(related.watch(), handler)
//!         .with_resync(records.clone())
//!         .build()?;
//!
//!     controller.run(CancellationToken::new()).await
//! }
//! ```

pub mod diagnostics;
pub mod guard;
pub mod mapper;
pub mod queue;
pub mod reconciler;
pub mod runtime;
pub mod store;

pub use diagnostics::{Diagnostic, RecordingDiagnosticSink, TracingDiagnosticSink};
pub use guard::StoreGuardManager;
pub use mapper::{RelatedEventHandler, StoreRelatedMapper};
pub use queue::{ExponentialBackoff, WorkQueue};
pub use reconciler::{handle_reconcile_error, ReconcileOutcome, Reconciler};
pub use runtime::{Controller, ControllerBuilder};
pub use store::{InMemoryRecordStore, InMemoryRelatedStore};
