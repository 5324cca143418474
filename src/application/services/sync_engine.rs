use crate::application::ports::{OfflineStore, ReplayTransport};
use crate::application::services::sync_queue::{EnqueueParams, SyncQueueService};
use crate::domain::entities::QueuedRequest;
use crate::domain::value_objects::{ActionId, ActionKind, ActionPayload, ActionStatus};
use crate::shared::config::SyncConfig;
use crate::shared::error::{AppError, Result};
use crate::shared::metrics::{self, ReplayOutcome};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

const LAST_DRAIN_SETTING: &str = "sync.last_drain_at";
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Terminal-status notification delivered to subscribers (UI toasts,
/// local read-cache invalidation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub action_id: ActionId,
    pub status: ActionStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub online: bool,
    pub pending: usize,
    pub failed: usize,
    pub in_flight: usize,
    pub last_drain_at: Option<i64>,
    pub sync_errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub unsynced_records: usize,
    pub requeued: usize,
    pub pending_queue: usize,
}

/// Drains the sync queue against the network: immediate attempts on
/// enqueue, drains on reconnect, a periodic sweep, and exponential backoff
/// with jitter between failed attempts. One attempt per action at a time.
pub struct SyncEngine {
    queue: Arc<SyncQueueService>,
    store: Arc<dyn OfflineStore>,
    transport: Arc<dyn ReplayTransport>,
    config: SyncConfig,
    online: AtomicBool,
    in_flight: Mutex<HashSet<ActionId>>,
    events: broadcast::Sender<SyncEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    sync_errors: AtomicU64,
}

impl SyncEngine {
    pub fn new(
        queue: Arc<SyncQueueService>,
        store: Arc<dyn OfflineStore>,
        transport: Arc<dyn ReplayTransport>,
        config: SyncConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            queue,
            store,
            transport,
            config,
            online: AtomicBool::new(true),
            in_flight: Mutex::new(HashSet::new()),
            events,
            tasks: Mutex::new(Vec::new()),
            sync_errors: AtomicU64::new(0),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Starts the periodic sweep so transient failures are retried even
    /// without a network event.
    pub async fn start(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(engine.config.sweep_interval));
            // The first tick fires immediately; skip it so startup drains
            // stay in the hands of load()/reconcile() callers.
            interval.tick().await;
            loop {
                interval.tick().await;
                if engine.is_online() {
                    engine.drain("sweep").await;
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }

    /// Aborts the sweep and any scheduled backoff timers.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            handle.abort();
        }
        tracing::info!(target: "sync::engine", "sync engine shut down");
    }

    /// Network-status signal. An offline→online transition drains all
    /// pending actions.
    pub fn set_online(self: &Arc<Self>, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            tracing::info!(target: "sync::engine", "network restored, draining queue");
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                engine.drain("online").await;
            });
        }
    }

    /// First attempt for a freshly enqueued action, if currently online.
    pub fn submit(self: &Arc<Self>, id: ActionId) {
        if !self.is_online() {
            return;
        }
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.attempt(id, "enqueue").await;
        });
    }

    /// Replays every pending action in enqueue order.
    pub async fn drain(self: &Arc<Self>, trigger: &str) {
        let pending = self.queue.list_pending().await;
        for action in pending {
            self.clone().attempt(action.id, trigger).await;
        }

        let now = chrono::Utc::now().timestamp();
        if let Err(err) = self
            .store
            .set_setting(LAST_DRAIN_SETTING, &now.to_string())
            .await
        {
            tracing::warn!(
                target: "sync::engine",
                error = %err,
                "failed to persist drain timestamp"
            );
        }
    }

    /// Re-enqueues unsynced offline records missing from the queue, so a
    /// restart or crash cannot strand local edits.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let records = self.store.get_records(None).await?;
        let unsynced: Vec<_> = records.into_iter().filter(|r| !r.synced).collect();

        let mut requeued = 0usize;
        for record in &unsynced {
            let payload = ActionPayload::new(record.data.clone())
                .map_err(AppError::ValidationError)?;
            let params = EnqueueParams::new(ActionKind::Update, record.entity_type, payload)
                .with_entity_id(record.id.clone());
            if self.queue.enqueue_if_missing(params).await? {
                requeued += 1;
            }
        }

        let report = ReconcileReport {
            unsynced_records: unsynced.len(),
            requeued,
            pending_queue: self.queue.pending_count().await,
        };
        tracing::info!(
            target: "sync::engine",
            requeued = report.requeued,
            pending = report.pending_queue,
            "reconcile pass completed"
        );
        Ok(report)
    }

    pub async fn status(&self) -> EngineStatus {
        let last_drain_at = match self.store.get_setting(LAST_DRAIN_SETTING).await {
            Ok(value) => value.and_then(|v| v.parse::<i64>().ok()),
            Err(_) => None,
        };
        EngineStatus {
            online: self.is_online(),
            pending: self.queue.pending_count().await,
            failed: self.queue.failed_count().await,
            in_flight: self.in_flight.lock().await.len(),
            last_drain_at,
            sync_errors: self.sync_errors.load(Ordering::Relaxed),
        }
    }

    /// One replay attempt for one action, with in-flight deduplication so
    /// overlapping triggers cannot double-send.
    // Returns an explicitly boxed future rather than an `async fn` so there is
    // no hidden opaque type to resolve through the mutual recursion
    // attempt -> settle -> spawn(attempt), which otherwise fails Send
    // inference. The boxing is a type-level change only; behavior is identical.
    fn attempt<'a>(
        self: Arc<Self>,
        id: ActionId,
        trigger: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if !self.is_online() {
                return;
            }
            {
                let mut in_flight = self.in_flight.lock().await;
                if !in_flight.insert(id.clone()) {
                    return;
                }
            }

            match self.replay_once(&id).await {
                Ok(Some(replay)) => self.settle(id.clone(), trigger, replay).await,
                Ok(None) => {} // not pending anymore, nothing to do
                Err(err) => {
                    self.sync_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        target: "sync::engine",
                        action_id = %id,
                        error = %err,
                        "replay bookkeeping failed"
                    );
                }
            }

            // Released only after the outcome is settled, so an overlapping
            // trigger cannot start a duplicate attempt mid-settle.
            self.in_flight.lock().await.remove(&id);
        })
    }

    /// Sends the action over the transport. Returns `Ok(None)` when the
    /// action is gone or no longer pending.
    async fn replay_once(
        &self,
        id: &ActionId,
    ) -> Result<Option<std::result::Result<(), String>>> {
        let action = match self.queue.get(id).await {
            Some(action) if action.is_pending() => action,
            _ => return Ok(None),
        };

        let request = QueuedRequest::for_action(&action, 0);
        let attempt = tokio::time::timeout(
            Duration::from_secs(self.config.attempt_timeout),
            self.transport.send(&request),
        )
        .await;

        let replay = match attempt {
            Err(_) => Err(format!(
                "attempt timed out after {}s",
                self.config.attempt_timeout
            )),
            Ok(Err(err)) => Err(err.to_string()),
            Ok(Ok(response)) if !response.ok => {
                Err(format!("server responded with status {}", response.status))
            }
            Ok(Ok(_)) => Ok(()),
        };
        Ok(Some(replay))
    }

    /// Applies the attempt outcome: confirm, schedule a backoff retry, or
    /// mark terminally failed.
    async fn settle(
        self: &Arc<Self>,
        id: ActionId,
        trigger: &str,
        replay: std::result::Result<(), String>,
    ) {
        let Some(action) = self.queue.get(&id).await else {
            return;
        };

        match replay {
            Ok(()) => {
                if let Err(err) = self.queue.mark_success(&id).await {
                    self.sync_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        target: "sync::engine",
                        action_id = %id,
                        error = %err,
                        "failed to confirm action"
                    );
                    return;
                }
                if let Some(entity_id) = action.entity_id.as_deref() {
                    // The durable mirror of the entity, when one exists, is
                    // now server-confirmed.
                    match self.store.mark_record_synced(entity_id).await {
                        Ok(()) | Err(AppError::NotFound(_)) => {}
                        Err(err) => {
                            tracing::warn!(
                                target: "sync::engine",
                                entity_id,
                                error = %err,
                                "failed to mark offline record synced"
                            );
                        }
                    }
                }
                metrics::record_replay_outcome(
                    ReplayOutcome::Success,
                    id.as_str(),
                    trigger,
                    action.retry_count,
                    None,
                );
                self.notify(
                    &id,
                    ActionStatus::Success,
                    format!("{} {} confirmed", action.entity_type, action.kind),
                );

                // Keep the Success flash visible briefly, then drop it.
                let engine = Arc::clone(self);
                let grace = Duration::from_secs(self.config.success_grace);
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    if let Err(err) = engine.queue.remove(&id).await {
                        tracing::warn!(
                            target: "sync::engine",
                            action_id = %id,
                            error = %err,
                            "failed to clear confirmed action"
                        );
                    }
                });
            }
            Err(message) => {
                let status = match self.queue.record_failure(&id, message.clone()).await {
                    Ok(status) => status,
                    Err(err) => {
                        self.sync_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            target: "sync::engine",
                            action_id = %id,
                            error = %err,
                            "failed to record attempt failure"
                        );
                        return;
                    }
                };

                match status {
                    ActionStatus::Pending => {
                        let backoff = self.backoff_delay(action.retry_count + 1);
                        metrics::record_replay_outcome(
                            ReplayOutcome::Failure,
                            id.as_str(),
                            trigger,
                            action.retry_count + 1,
                            Some(backoff.as_millis() as u64),
                        );
                        tracing::debug!(
                            target: "sync::engine",
                            action_id = %id,
                            backoff_ms = backoff.as_millis() as u64,
                            "scheduling retry"
                        );

                        let engine = Arc::clone(self);
                        let retry_id = id.clone();
                        let handle = tokio::spawn(async move {
                            tokio::time::sleep(backoff).await;
                            engine.attempt(retry_id, "backoff").await;
                        });
                        self.tasks.lock().await.push(handle);
                    }
                    ActionStatus::Failed => {
                        metrics::record_replay_outcome(
                            ReplayOutcome::Failure,
                            id.as_str(),
                            trigger,
                            action.retry_count + 1,
                            None,
                        );
                        tracing::warn!(
                            target: "sync::engine",
                            action_id = %id,
                            entity = %action.entity_type,
                            kind = %action.kind,
                            "action failed terminally"
                        );
                        self.notify(
                            &id,
                            ActionStatus::Failed,
                            format!(
                                "{} {} failed: {}",
                                action.entity_type, action.kind, message
                            ),
                        );
                    }
                    _ => {}
                }
            }
        }
    }

    /// User-requested retry of a terminally failed action.
    pub async fn retry_failed(self: &Arc<Self>, id: &ActionId) -> Result<()> {
        self.queue.retry_failed(id).await?;
        self.submit(id.clone());
        Ok(())
    }

    /// User discard of a failed action; the intended mutation is dropped
    /// explicitly, never silently.
    pub async fn discard_failed(&self, id: &ActionId) -> Result<()> {
        let action = self
            .queue
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("action {id}")))?;
        if !action.is_failed() {
            return Err(AppError::ValidationError(format!(
                "action {id} is not in a failed state"
            )));
        }
        self.queue.remove(id).await
    }

    /// Exponential backoff capped at the configured ceiling, with ±20%
    /// jitter so simultaneous failures do not retry in lockstep.
    fn backoff_delay(&self, retry_count: u32) -> Duration {
        let exp = 2u64.saturating_pow(retry_count.min(16));
        let capped = exp.min(self.config.backoff_ceiling);
        let jitter = rand::thread_rng().gen_range(0.8..=1.2);
        Duration::from_millis(((capped * 1000) as f64 * jitter) as u64)
    }

    fn notify(&self, id: &ActionId, status: ActionStatus, message: String) {
        let _ = self.events.send(SyncEvent {
            action_id: id.clone(),
            status,
            message,
        });
    }
}
