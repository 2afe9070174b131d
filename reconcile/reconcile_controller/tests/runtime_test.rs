//! End-to-end tests for the controller runtime.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{test_config, Harness, TOKEN};
use reconcile_controller::reconciler::REASON_RECONCILE_ERROR;
use reconcile_controller::store::WATCH_CAPACITY;
use reconcile_controller::{
    ControllerBuilder, InMemoryRelatedStore, RelatedEventHandler, StoreRelatedMapper, WorkQueue,
};
use reconcile_core::{ConfigError, Error, ManagedRecord, RecordKey, RelatedRecord, RelatedRef, Result};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

struct Running {
    handle: JoinHandle<Result<()>>,
    shutdown: CancellationToken,
    queue: WorkQueue<RecordKey>,
}

impl Running {
    async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("controller did not stop")
            .expect("controller task panicked")
    }
}

fn start(h: &Harness, related: Option<&InMemoryRelatedStore>) -> Running {
    let mut builder = ControllerBuilder::new(h.config.clone(), h.reconciler.clone())
        .for_records(h.store.watch())
        .with_resync(h.store.clone());
    if let Some(related) = related {
        let handler = RelatedEventHandler::new(Arc::new(StoreRelatedMapper::new(h.store.clone())));
        builder = builder.watches_related(related.watch(), handler);
    }
    let controller = builder.build().unwrap();
    let queue = controller.queue().clone();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(controller.run(shutdown.clone()));
    Running {
        handle,
        shutdown,
        queue,
    }
}

fn create(h: &Harness, name: &str, mesh: Option<&str>) -> RecordKey {
    let mut record = ManagedRecord::new(RecordKey::new("prod", name), json!({"port": 8080}));
    if let Some(mesh) = mesh {
        record = record.with_related_ref(RelatedRef::new(mesh));
    }
    h.store.create(record).unwrap().key
}

fn is_guarded(h: &Harness, key: &RecordKey) -> bool {
    h.store
        .snapshot(key)
        .map(|r| r.has_guard_token(TOKEN))
        .unwrap_or(false)
}

fn converge_count(h: &Harness, key: &RecordKey) -> usize {
    h.engine.converged().iter().filter(|k| *k == key).count()
}

#[tokio::test]
async fn test_records_are_converged_and_cleaned_up() {
    let h = Harness::new();
    let running = start(&h, None);

    let key = create(&h, "vn-a", None);
    assert!(
        common::eventually(WAIT, || is_guarded(&h, &key) && h.engine.converges() >= 1).await
    );

    h.store.mark_for_deletion(&key).unwrap();
    assert!(common::eventually(WAIT, || !h.store.contains(&key)).await);
    assert_eq!(h.engine.teardowns(), 1);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_existing_records_are_picked_up_at_startup() {
    let h = Harness::new();
    let a = create(&h, "vn-a", None);
    let b = create(&h, "vn-b", None);

    let running = start(&h, None);

    assert!(
        common::eventually(WAIT, || converge_count(&h, &a) >= 1 && converge_count(&h, &b) >= 1)
            .await
    );
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let mut config = test_config();
    config.max_concurrent_reconciles = 2;
    let h = Harness::with_config(config);
    h.engine.set_delay(Some(Duration::from_millis(20)));

    let running = start(&h, None);
    let keys: Vec<RecordKey> = (0..6)
        .map(|i| create(&h, &format!("vn-{}", i), None))
        .collect();

    assert!(
        common::eventually(WAIT, || keys.iter().all(|k| converge_count(&h, k) >= 1)).await
    );
    assert!(h.engine.max_in_flight() <= 2);
    assert_eq!(h.engine.max_in_flight(), 2);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_one_reconcile_per_key_at_a_time() {
    let h = Harness::new();
    h.engine.set_delay(Some(Duration::from_millis(10)));
    let running = start(&h, None);

    let key = create(&h, "vn-a", None);
    for port in 0..20 {
        h.store.update_spec(&key, json!({ "port": port })).unwrap();
    }

    assert!(common::eventually(WAIT, || converge_count(&h, &key) >= 2).await);
    assert_eq!(h.engine.max_in_flight(), 1);
    // Bursts of events collapse into far fewer reconciles.
    assert!(converge_count(&h, &key) < 21);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_failures_are_retried_until_they_succeed() {
    let h = Harness::new();
    h.engine.set_fail_converge(true);
    let running = start(&h, None);

    let key = create(&h, "vn-a", None);
    assert!(common::eventually(WAIT, || h.engine.converges() >= 3).await);
    assert!(h.diagnostics.count_reason(REASON_RECONCILE_ERROR) >= 2);
    assert!(running.queue.num_requeues(&key) >= 1);

    h.engine.set_fail_converge(false);
    assert!(common::eventually(WAIT, || running.queue.num_requeues(&key) == 0).await);
    assert!(h.store.snapshot(&key).unwrap().has_guard_token(TOKEN));

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_requeue_after_runs_again() {
    let h = Harness::new();
    h.engine.set_requeue_after(Some(Duration::from_millis(20)));
    let running = start(&h, None);

    let key = create(&h, "vn-a", None);
    assert!(common::eventually(WAIT, || converge_count(&h, &key) >= 4).await);
    // Requeue requests do not count as failures.
    assert_eq!(running.queue.num_requeues(&key), 0);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_related_change_requeues_dependents() {
    let h = Harness::new();
    let related = InMemoryRelatedStore::new();
    let mesh = related.apply(RelatedRecord::new("mesh-x", json!({})));

    let running = start(&h, Some(&related));
    let a = create(&h, "vn-a", Some("mesh-x"));
    let b = create(&h, "vn-b", Some("mesh-x"));
    let c = create(&h, "vn-c", Some("mesh-y"));

    assert!(
        common::eventually(WAIT, || [&a, &b, &c].iter().all(|k| converge_count(&h, k) >= 1))
            .await
    );
    // Let the guard-token updates settle.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before_a = converge_count(&h, &a);
    let before_b = converge_count(&h, &b);
    let before_c = converge_count(&h, &c);

    related.set_active(&mesh.key, true).unwrap();

    assert!(
        common::eventually(WAIT, || {
            converge_count(&h, &a) > before_a && converge_count(&h, &b) > before_b
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(converge_count(&h, &c), before_c);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_burst_beyond_feed_capacity_is_fully_reconciled() {
    let h = Harness::new();
    let running = start(&h, None);
    // Let the startup list run against the empty store.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let keys: Vec<RecordKey> = (0..WATCH_CAPACITY * 2)
        .map(|i| create(&h, &format!("vn-{}", i), None))
        .collect();

    let all_guarded = || keys.iter().all(|k| is_guarded(&h, k));
    assert!(common::eventually(Duration::from_secs(20), all_guarded).await);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_related_feed_lag_requeues_dependents() {
    let h = Harness::new();
    let related = InMemoryRelatedStore::new();
    let mesh = related.apply(RelatedRecord::new("mesh-x", json!({})));

    let running = start(&h, Some(&related));
    let a = create(&h, "vn-a", Some("mesh-x"));
    assert!(common::eventually(WAIT, || converge_count(&h, &a) >= 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = converge_count(&h, &a);

    // The activation is pushed out of the feed by unrelated changes.
    related.set_active(&mesh.key, true).unwrap();
    for i in 0..WATCH_CAPACITY + 16 {
        related.apply(RelatedRecord::new(format!("other-{}", i), json!({})));
    }

    assert!(common::eventually(WAIT, || converge_count(&h, &a) > before).await);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_times_out_on_stuck_work() {
    let mut config = test_config();
    config.shutdown_timeout_secs = 1;
    config.call_timeout_ms = 60_000;
    let h = Harness::with_config(config);
    h.engine.set_delay(Some(Duration::from_secs(30)));

    let running = start(&h, None);
    let key = create(&h, "vn-a", None);
    assert!(common::eventually(WAIT, || h.engine.max_in_flight() >= 1).await);

    let err = running.stop().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { operation: "shutdown", .. }));
    assert!(h.store.contains(&key));
}

#[tokio::test]
async fn test_build_requires_record_feed() {
    let h = Harness::new();
    let result = ControllerBuilder::new(h.config.clone(), h.reconciler.clone()).build();
    assert!(matches!(result, Err(Error::Config(ConfigError::Invalid(_)))));
}

#[tokio::test]
async fn test_build_requires_resync_store() {
    let h = Harness::new();
    let result = ControllerBuilder::new(h.config.clone(), h.reconciler.clone())
        .for_records(h.store.watch())
        .build();
    assert!(matches!(result, Err(Error::Config(ConfigError::Invalid(_)))));
}

#[tokio::test]
async fn test_build_rejects_invalid_config() {
    let h = Harness::new();
    let mut config = test_config();
    config.max_concurrent_reconciles = 0;

    let result = ControllerBuilder::new(config, h.reconciler.clone())
        .for_records(h.store.watch())
        .build();
    assert!(matches!(result, Err(Error::Config(_))));
}
