//! Error types for the reconciliation system.
//!
//! Errors are organized by the collaborator that produced them. The root
//! error type, `Error`, wraps the ones a reconcile can fail with so the
//! controller can propagate them with `?` and the scheduler can treat every
//! error uniformly as retryable. `QueueError` is handled where the queue is
//! used.

use std::time::Duration;

use crate::id::RecordKey;
use thiserror::Error;

/// Root error type for the reconciliation system.
#[derive(Debug, Error)]
pub enum Error {
    /// Record store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Errors reported by the convergence engine
    #[error("Convergence error: {0}")]
    Convergence(#[from] ConvergenceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An external call exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out
        operation: &'static str,

        /// The deadline that was exceeded
        after: Duration,
    },

    /// The invocation was cancelled before the operation completed
    #[error("{0} cancelled")]
    Cancelled(&'static str),

    /// Logging initialization errors
    #[error("Logging error: {0}")]
    Logging(String),
}

impl Error {
    /// Whether this error means the requested record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound(_)))
    }
}

/// Errors related to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record with the given key was not found
    #[error("Record not found: {0}")]
    NotFound(RecordKey),

    /// Record with the given key already exists
    #[error("Record already exists: {0}")]
    AlreadyExists(RecordKey),

    /// The update conflicts with the record's current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store rejected the request
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by a convergence engine.
///
/// The controller does not interpret these beyond passing them on; the
/// controller runtime only distinguishes an explicit requeue request from
/// a failure.
#[derive(Debug, Error)]
pub enum ConvergenceError {
    /// Converge or teardown failed
    #[error("{0}")]
    Failed(String),

    /// The engine made progress but needs to be invoked again
    #[error("requeue needed: {reason}")]
    RequeueNeeded {
        /// Why another pass is needed
        reason: String,

        /// Delay before the next pass, if the engine knows one
        after: Option<Duration>,
    },
}

impl ConvergenceError {
    /// Create a failure with the given message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Ask for another pass as soon as the scheduler's backoff allows.
    pub fn requeue(reason: impl Into<String>) -> Self {
        Self::RequeueNeeded {
            reason: reason.into(),
            after: None,
        }
    }

    /// Ask for another pass after a fixed delay.
    pub fn requeue_after(reason: impl Into<String>, after: Duration) -> Self {
        Self::RequeueNeeded {
            reason: reason.into(),
            after: Some(after),
        }
    }
}

/// Errors related to the work queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue no longer accepts work
    #[error("Queue is shutting down")]
    ShuttingDown,
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    /// The configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type used throughout the reconciliation system.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let store_err = StoreError::NotFound(RecordKey::new("default", "vn-1"));
        let error: Error = store_err.into();
        assert!(matches!(error, Error::Store(_)));
        assert!(error.is_not_found());

        let error: Error = ConvergenceError::failed("boom").into();
        assert!(matches!(error, Error::Convergence(_)));
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_error_display() {
        let key = RecordKey::new("default", "vn-1");
        let error: Error = StoreError::NotFound(key.clone()).into();
        assert_eq!(
            error.to_string(),
            format!("Store error: Record not found: {}", key)
        );

        let error = Error::Timeout {
            operation: "teardown",
            after: Duration::from_secs(2),
        };
        assert_eq!(error.to_string(), "teardown timed out after 2s");
    }

    #[test]
    fn test_requeue_constructors() {
        let err = ConvergenceError::requeue_after("waiting on dependency", Duration::from_secs(5));
        assert!(matches!(
            err,
            ConvergenceError::RequeueNeeded { after: Some(d), .. } if d == Duration::from_secs(5)
        ));
        assert!(matches!(
            ConvergenceError::requeue("again"),
            ConvergenceError::RequeueNeeded { after: None, .. }
        ));
    }
}
