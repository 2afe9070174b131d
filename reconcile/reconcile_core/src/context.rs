//! Per-invocation context.
//!
//! Every reconcile runs under a [`ReconcileContext`]. It carries the
//! cancellation token of the worker that owns the invocation and the
//! deadline applied to each external call. Collaborators receive the context
//! so they can observe cancellation themselves; the controller additionally
//! races each call against it with [`ReconcileContext::run`].

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cancellation and deadline scope of a single reconcile invocation.
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    token: CancellationToken,
    call_timeout: Duration,
}

impl ReconcileContext {
    /// Create a context bound to the given cancellation token.
    pub fn new(token: CancellationToken, call_timeout: Duration) -> Self {
        Self {
            token,
            call_timeout,
        }
    }

    /// A context that is never cancelled from outside.
    pub fn detached(call_timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), call_timeout)
    }

    /// The cancellation token for this invocation.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline applied to each external call.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Whether the invocation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A context for nested work that is cancelled together with this one.
    pub fn child(&self) -> Self {
        Self::new(self.token.child_token(), self.call_timeout)
    }

    /// Run one external call, bounded by cancellation and the call timeout.
    ///
    /// The call is attempted exactly once. A cancelled or timed-out call is
    /// dropped, which cancels whatever the future was doing.
    pub async fn run<F, T, E>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<Error>,
    {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled(operation));
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled(operation)),
            outcome = tokio::time::timeout(self.call_timeout, call) => match outcome {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(Error::Timeout {
                    operation,
                    after: self.call_timeout,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::id::RecordKey;

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let ctx = ReconcileContext::detached(Duration::from_secs(1));
        let value = ctx
            .run("get", async { Ok::<_, StoreError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = ctx
            .run("get", async {
                Err::<(), _>(StoreError::NotFound(RecordKey::new("ns", "a")))
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let ctx = ReconcileContext::detached(Duration::from_millis(20));
        let err = ctx
            .run("converge", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { operation: "converge", .. }));
    }

    #[tokio::test]
    async fn test_run_observes_cancellation() {
        let ctx = ReconcileContext::detached(Duration::from_secs(5));
        let child = ctx.child();
        ctx.cancellation().cancel();
        assert!(child.is_cancelled());

        let err = child
            .run("teardown", async { Ok::<_, StoreError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled("teardown")));
    }
}
