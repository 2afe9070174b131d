//! Shared test doubles.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reconcile_controller::{
    InMemoryRecordStore, RecordingDiagnosticSink, Reconciler, StoreGuardManager,
};
use reconcile_core::{
    ControllerConfig, ConvergenceEngine, ConvergenceError, ManagedRecord, ReconcileContext,
    RecordKey,
};
use tracing_subscriber::EnvFilter;

pub const TOKEN: &str = "reconcile.io/resources";

/// A convergence engine that counts calls and can be told to fail, ask
/// for a requeue, or stall.
#[derive(Default)]
pub struct TestEngine {
    converges: AtomicUsize,
    teardowns: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_converge: AtomicBool,
    fail_teardown: AtomicBool,
    requeue_after: Mutex<Option<Duration>>,
    delay: Mutex<Option<Duration>>,
    converged: Mutex<Vec<RecordKey>>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn converges(&self) -> usize {
        self.converges.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Keys passed to `converge`, in call order.
    pub fn converged(&self) -> Vec<RecordKey> {
        self.converged.lock().clone()
    }

    pub fn set_fail_converge(&self, fail: bool) {
        self.fail_converge.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_teardown(&self, fail: bool) {
        self.fail_teardown.store(fail, Ordering::SeqCst);
    }

    pub fn set_requeue_after(&self, after: Option<Duration>) {
        *self.requeue_after.lock() = after;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConvergenceEngine for TestEngine {
    async fn converge(
        &self,
        _ctx: &ReconcileContext,
        record: &ManagedRecord,
    ) -> Result<(), ConvergenceError> {
        self.enter().await;
        self.converges.fetch_add(1, Ordering::SeqCst);
        self.converged.lock().push(record.key.clone());
        self.leave();

        if self.fail_converge.load(Ordering::SeqCst) {
            return Err(ConvergenceError::failed("virtual node update rejected"));
        }
        let requeue_after = *self.requeue_after.lock();
        if let Some(after) = requeue_after {
            return Err(ConvergenceError::requeue_after("mesh not active", after));
        }
        Ok(())
    }

    async fn teardown(
        &self,
        _ctx: &ReconcileContext,
        _record: &ManagedRecord,
    ) -> Result<(), ConvergenceError> {
        self.enter().await;
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        self.leave();

        if self.fail_teardown.load(Ordering::SeqCst) {
            return Err(ConvergenceError::failed("virtual node delete rejected"));
        }
        Ok(())
    }
}

/// A reconciler over an in-memory store, with its collaborators exposed.
pub struct Harness {
    pub config: ControllerConfig,
    pub store: Arc<InMemoryRecordStore>,
    pub engine: Arc<TestEngine>,
    pub diagnostics: Arc<RecordingDiagnosticSink>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        init_tracing();
        let store = Arc::new(InMemoryRecordStore::new());
        let engine = Arc::new(TestEngine::new());
        let diagnostics = Arc::new(RecordingDiagnosticSink::new());
        let reconciler = Arc::new(Reconciler::new(
            &config,
            store.clone(),
            Arc::new(StoreGuardManager::new(store.clone())),
            engine.clone(),
            diagnostics.clone(),
        ));

        Self {
            config,
            store,
            engine,
            diagnostics,
            reconciler,
        }
    }

    pub fn ctx(&self) -> ReconcileContext {
        ReconcileContext::detached(self.config.call_timeout())
    }
}

/// Route controller logs to the test output. `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Defaults with delays short enough for tests.
pub fn test_config() -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.guard_token = TOKEN.to_string();
    config.call_timeout_ms = 1_000;
    config.backoff.base_delay_ms = 5;
    config.backoff.max_delay_ms = 50;
    config.shutdown_timeout_secs = 5;
    config
}

/// Poll `check` until it holds or `within` passes.
pub async fn eventually<F>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
