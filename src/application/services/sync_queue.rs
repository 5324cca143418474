use crate::application::ports::OfflineStore;
use crate::domain::entities::{OptimisticAction, QueuedRequest};
use crate::domain::projection::apply_optimistic;
use crate::domain::value_objects::{ActionId, ActionKind, ActionPayload, ActionStatus, EntityType};
use crate::shared::error::{AppError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct EnqueueParams {
    pub kind: ActionKind,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub payload: ActionPayload,
    pub prior_state: Option<ActionPayload>,
    pub max_retries: u32,
    pub priority: i32,
}

impl EnqueueParams {
    pub fn new(kind: ActionKind, entity_type: EntityType, payload: ActionPayload) -> Self {
        Self {
            kind,
            entity_type,
            entity_id: None,
            payload,
            prior_state: None,
            max_retries: 3,
            priority: 0,
        }
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_prior_state(mut self, prior_state: ActionPayload) -> Self {
        self.prior_state = Some(prior_state);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// In-memory queue of optimistic actions, mirrored durably on every
/// mutation so pending work survives a process restart.
pub struct SyncQueueService {
    store: Arc<dyn OfflineStore>,
    actions: RwLock<HashMap<ActionId, OptimisticAction>>,
    next_sequence: AtomicU64,
}

impl SyncQueueService {
    pub fn new(store: Arc<dyn OfflineStore>) -> Self {
        Self {
            store,
            actions: RwLock::new(HashMap::new()),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Rebuilds the in-memory queue from the durable mirror. Called once at
    /// startup; safe to call again (the durable copy wins).
    pub async fn load(&self) -> Result<usize> {
        let requests = self.store.list_requests().await?;
        let mut actions = self.actions.write().await;
        actions.clear();

        let mut max_sequence = 0u64;
        for request in requests {
            let action = request.into_action();
            max_sequence = max_sequence.max(action.sequence + 1);
            actions.insert(action.id.clone(), action);
        }
        self.next_sequence.store(max_sequence, Ordering::SeqCst);

        tracing::debug!(
            target: "sync::queue",
            loaded = actions.len(),
            "rebuilt sync queue from durable store"
        );
        Ok(actions.len())
    }

    pub async fn enqueue(&self, params: EnqueueParams) -> Result<ActionId> {
        if params.max_retries == 0 {
            return Err(AppError::ValidationError(
                "max_retries must be at least 1".to_string(),
            ));
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let action = OptimisticAction::new(
            params.kind,
            params.entity_type,
            params.entity_id,
            params.payload,
            params.prior_state,
            sequence,
            params.max_retries,
        );

        let request = QueuedRequest::for_action(&action, params.priority);
        self.store.enqueue_request(&request).await?;

        let id = action.id.clone();
        self.actions.write().await.insert(id.clone(), action);
        Ok(id)
    }

    /// Projects all pending actions for `entity_type` onto the latest
    /// server-confirmed list. Pure replay in enqueue order.
    pub async fn projected(&self, base: &[Value], entity_type: EntityType) -> Vec<Value> {
        let actions = self.actions.read().await;
        let pending: Vec<OptimisticAction> = actions.values().cloned().collect();
        apply_optimistic(base, entity_type, &pending)
    }

    pub async fn get(&self, id: &ActionId) -> Option<OptimisticAction> {
        self.actions.read().await.get(id).cloned()
    }

    pub async fn list_pending(&self) -> Vec<OptimisticAction> {
        let actions = self.actions.read().await;
        let mut pending: Vec<OptimisticAction> = actions
            .values()
            .filter(|action| action.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|action| action.sequence);
        pending
    }

    pub async fn list_failed(&self) -> Vec<OptimisticAction> {
        let actions = self.actions.read().await;
        let mut failed: Vec<OptimisticAction> = actions
            .values()
            .filter(|action| action.is_failed())
            .cloned()
            .collect();
        failed.sort_by_key(|action| action.sequence);
        failed
    }

    /// Marks a confirmed action. The durable work item is removed; the
    /// in-memory copy stays as a transient Success until the grace removal.
    pub async fn mark_success(&self, id: &ActionId) -> Result<()> {
        self.store.remove_request(id).await?;
        if let Some(action) = self.actions.write().await.get_mut(id) {
            action.mark_success();
        }
        Ok(())
    }

    /// Records a failed attempt, mirroring retry bookkeeping durably.
    /// Returns the resulting status.
    pub async fn record_failure(&self, id: &ActionId, message: String) -> Result<ActionStatus> {
        let mut actions = self.actions.write().await;
        let action = actions
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("action {id}")))?;

        let status = action.record_failure(message);
        let snapshot = action.clone();
        drop(actions);

        let remaining = self.store.increment_retry(id).await?;
        if remaining.is_none() {
            // Retry budget exhausted: the work item was dropped, but the
            // failed action must stay durable until the user resolves it.
            let request = QueuedRequest::for_action(&snapshot, 0);
            self.store.enqueue_request(&request).await?;
        } else {
            self.store
                .update_request(&QueuedRequest::for_action(&snapshot, 0))
                .await?;
        }
        Ok(status)
    }

    /// Removes an action from both layers. Removing an unknown id is a
    /// no-op so concurrent owners of the durable store can race safely.
    pub async fn remove(&self, id: &ActionId) -> Result<()> {
        self.actions.write().await.remove(id);
        self.store.remove_request(id).await?;
        Ok(())
    }

    /// Resets a terminally failed action for another round of attempts.
    pub async fn retry_failed(&self, id: &ActionId) -> Result<OptimisticAction> {
        let mut actions = self.actions.write().await;
        let action = actions
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("action {id}")))?;

        if !action.is_failed() {
            return Err(AppError::ValidationError(format!(
                "action {id} is not in a failed state"
            )));
        }

        action.reset_for_retry();
        let snapshot = action.clone();
        drop(actions);

        self.store
            .update_request(&QueuedRequest::for_action(&snapshot, 0))
            .await?;
        Ok(snapshot)
    }

    /// Ensures an action exists for the given entity, used by the
    /// reconcile pass. Returns false when a pending or failed action
    /// already covers it.
    pub async fn enqueue_if_missing(&self, params: EnqueueParams) -> Result<bool> {
        {
            let actions = self.actions.read().await;
            let covered = actions.values().any(|action| {
                action.entity_type == params.entity_type
                    && action.entity_id == params.entity_id
                    && (action.is_pending() || action.is_failed())
            });
            if covered {
                return Ok(false);
            }
        }
        self.enqueue(params).await?;
        Ok(true)
    }

    pub async fn pending_count(&self) -> usize {
        self.actions
            .read()
            .await
            .values()
            .filter(|action| action.is_pending())
            .count()
    }

    pub async fn failed_count(&self) -> usize {
        self.actions
            .read()
            .await
            .values()
            .filter(|action| action.is_failed())
            .count()
    }
}
