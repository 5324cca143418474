//! End-to-end flow over the public API: local-first edits, reconcile,
//! replay over a scripted transport, and projection of pending work.

use async_trait::async_trait;
use ecotrace_core::shared::config::{DatabaseConfig, SyncConfig};
use ecotrace_core::{
    ActionKind, ActionPayload, ActionStatus, AppError, EntityType, EnqueueParams, OfflineRecord,
    QueuedRequest, ReplayTransport, Result, SqliteOfflineStore, SyncEngine, SyncQueueService,
    TransportResponse,
};
use ecotrace_core::application::ports::OfflineStore;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::Duration;

struct FlakyTransport {
    attempts: AtomicUsize,
    fail_first: AtomicBool,
}

impl FlakyTransport {
    fn new(fail_first: bool) -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
            fail_first: AtomicBool::new(fail_first),
        })
    }
}

#[async_trait]
impl ReplayTransport for FlakyTransport {
    async fn send(&self, request: &QueuedRequest) -> Result<TransportResponse> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_first.swap(false, Ordering::SeqCst) {
            return Err(AppError::Network("connection refused".into()));
        }
        Ok(TransportResponse::success(
            201,
            Some(json!({"url": request.url})),
        ))
    }
}

async fn setup() -> (Arc<SqliteOfflineStore>, Arc<SyncQueueService>) {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        quota_bytes: 1024 * 1024,
    };
    // Open the store on a blocking thread so establishing the sqlite
    // connection is isolated from the tests' paused virtual clock; otherwise
    // the auto-advanced clock fires the pool acquire timeout before the
    // connection opens (PoolTimedOut). Pure test plumbing.
    let store = Arc::new(
        tokio::task::spawn_blocking(move || {
            tokio::runtime::Handle::current().block_on(SqliteOfflineStore::connect(&config))
        })
        .await
        .unwrap()
        .unwrap(),
    );
    let queue = Arc::new(SyncQueueService::new(store.clone()));
    (store, queue)
}

fn sync_config() -> SyncConfig {
    SyncConfig {
        sweep_interval: 30,
        max_retries: 3,
        backoff_ceiling: 60,
        attempt_timeout: 15,
        success_grace: 1,
    }
}

#[tokio::test(start_paused = true)]
async fn local_edit_reconciles_replays_and_marks_synced() {
    let (store, queue) = setup().await;
    let transport = FlakyTransport::new(false);
    let engine = SyncEngine::new(queue.clone(), store.clone(), transport.clone(), sync_config());
    let mut events = engine.subscribe();

    // A footprint entry edited locally before any network round trip.
    store
        .put_record(&OfflineRecord::new(
            "fp-local".into(),
            EntityType::Footprint,
            json!({"id": "fp-local", "co2e": 4.2, "category": "transport"}),
        ))
        .await
        .unwrap();
    store
        .update_record("fp-local", &json!({"co2e": 3.9}))
        .await
        .unwrap();

    // Startup reconcile turns the unsynced record into queued work.
    let report = engine.reconcile().await.unwrap();
    assert_eq!(report.requeued, 1);

    // The UI sees the pending edit projected over the server list.
    let server_list = vec![json!({"id": "fp-local", "co2e": 4.2, "category": "transport"})];
    let projected = queue.projected(&server_list, EntityType::Footprint).await;
    assert_eq!(projected[0]["co2e"], json!(3.9));

    engine.drain("startup").await;
    let event = events.recv().await.unwrap();
    assert_eq!(event.status, ActionStatus::Success);

    let record = store.get_record("fp-local").await.unwrap().unwrap();
    assert!(record.synced);
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_through_backoff() {
    let (store, queue) = setup().await;
    let transport = FlakyTransport::new(true);
    let engine = SyncEngine::new(queue.clone(), store.clone(), transport.clone(), sync_config());
    let mut events = engine.subscribe();

    let id = queue
        .enqueue(
            EnqueueParams::new(
                ActionKind::Add,
                EntityType::Footprint,
                ActionPayload::new(json!({"id": "fp-1", "co2e": 0.8})).unwrap(),
            )
            .with_entity_id("fp-1"),
        )
        .await
        .unwrap();
    engine.submit(id.clone());

    // First attempt fails, the backoff timer retries, the retry lands.
    let event = events.recv().await.unwrap();
    assert_eq!(event.status, ActionStatus::Success);
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);

    // After the grace period nothing of the action remains.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(queue.get(&id).await.is_none());
    assert!(store.list_requests().await.unwrap().is_empty());
    engine.shutdown().await;
}
