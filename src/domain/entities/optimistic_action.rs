use crate::domain::value_objects::{ActionId, ActionKind, ActionPayload, ActionStatus, EntityType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single intended mutation awaiting server confirmation. The in-memory
/// queue owns the authoritative copy; the durable store mirrors it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimisticAction {
    pub id: ActionId,
    pub kind: ActionKind,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub payload: ActionPayload,
    /// State needed to reverse the optimistic projection if the action
    /// ultimately fails.
    pub prior_state: Option<ActionPayload>,
    pub status: ActionStatus,
    /// Monotonic per-queue position; projection replays in this order.
    pub sequence: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub enqueued_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl OptimisticAction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: ActionKind,
        entity_type: EntityType,
        entity_id: Option<String>,
        payload: ActionPayload,
        prior_state: Option<ActionPayload>,
        sequence: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            id: ActionId::generate(),
            kind,
            entity_type,
            entity_id,
            payload,
            prior_state,
            status: ActionStatus::Pending,
            sequence,
            retry_count: 0,
            max_retries,
            enqueued_at: Utc::now(),
            error_message: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ActionStatus::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.status == ActionStatus::Failed
    }

    /// Records a failed attempt. Returns the resulting status: Pending while
    /// retry budget remains, Failed once it is exhausted.
    pub fn record_failure(&mut self, message: String) -> ActionStatus {
        self.retry_count += 1;
        self.error_message = Some(message);
        if self.retry_count >= self.max_retries {
            self.status = ActionStatus::Failed;
        } else {
            self.status = ActionStatus::Pending;
        }
        self.status.clone()
    }

    pub fn mark_success(&mut self) {
        self.status = ActionStatus::Success;
        self.error_message = None;
    }

    /// User-requested retry of a terminally failed action.
    pub fn reset_for_retry(&mut self) {
        self.retry_count = 0;
        self.status = ActionStatus::Pending;
        self.error_message = None;
    }
}
