//! # Reconcile Core
//!
//! `reconcile_core` provides the building blocks shared by the reconciliation
//! controller: record identities, the managed and related record types, the
//! error hierarchy, the collaborator contracts the controller depends on, and
//! the configuration and logging plumbing used to wire a controller process.
//!
//! ## Core Principles
//!
//! 1. **Guarded deletion**: a managed record carries a set of guard tokens.
//!    The store only removes a record once its deletion marker is set *and*
//!    every guard token is gone, so the owner of a token gets the chance to
//!    tear down external state first.
//!
//! 2. **Idempotent steps**: every collaborator call may be repeated after a
//!    crash or a failure without changing the outcome.
//!
//! 3. **No hidden state**: collaborators are passed in explicitly as trait
//!    objects and every reconcile re-reads current state from the store.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all reconciliation components
//! - **id**: Record keys and strongly-typed uids
//! - **types**: Managed records, related records, lifecycle states, watch events
//! - **traits**: Store, guard manager, convergence engine, mapper and diagnostic contracts
//! - **context**: Per-invocation cancellation and deadline propagation
//! - **utils**: Configuration and logging

pub mod context;
pub mod error;
pub mod id;
pub mod traits;
pub mod types;
pub mod utils;

pub use context::ReconcileContext;
pub use error::{ConfigError, ConvergenceError, Error, QueueError, Result, StoreError};
pub use id::{RecordKey, RecordUid, RelatedUid};
pub use traits::{ConvergenceEngine, DiagnosticSink, EventMapper, GuardManager, RecordStore};
pub use types::{
    LifecycleState, ManagedRecord, RelatedIdentity, RelatedRecord, RelatedRef, Severity,
    WatchEvent,
};
pub use utils::{BackoffConfig, ControllerConfig, LogLevel, LoggingConfig};
