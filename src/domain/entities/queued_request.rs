use crate::domain::entities::OptimisticAction;
use crate::domain::value_objects::{ActionId, ActionKind, ActionPayload, ActionStatus, EntityType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Durable counterpart of an in-memory [`OptimisticAction`]: everything
/// needed to replay the network call after a process restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedRequest {
    pub id: ActionId,
    pub kind: ActionKind,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub method: String,
    pub url: String,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
    pub payload: ActionPayload,
    pub prior_state: Option<ActionPayload>,
    pub status: ActionStatus,
    pub priority: i32,
    pub sequence: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl QueuedRequest {
    /// Derives the replayable request for an action. Adds POST the
    /// collection, updates PUT and deletes DELETE the entity resource.
    pub fn for_action(action: &OptimisticAction, priority: i32) -> Self {
        let base = action.entity_type.api_path().to_string();
        let (method, url, body) = match action.kind {
            ActionKind::Add => ("POST", base, Some(action.payload.as_json().clone())),
            ActionKind::Update => (
                "PUT",
                entity_url(&base, action.entity_id.as_deref()),
                Some(action.payload.as_json().clone()),
            ),
            ActionKind::Delete => ("DELETE", entity_url(&base, action.entity_id.as_deref()), None),
        };

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        Self {
            id: action.id.clone(),
            kind: action.kind,
            entity_type: action.entity_type,
            entity_id: action.entity_id.clone(),
            method: method.to_string(),
            url,
            body,
            headers,
            payload: action.payload.clone(),
            prior_state: action.prior_state.clone(),
            status: action.status.clone(),
            priority,
            sequence: action.sequence,
            retry_count: action.retry_count,
            max_retries: action.max_retries,
            created_at: action.enqueued_at,
            updated_at: Utc::now(),
            error_message: action.error_message.clone(),
        }
    }

    /// Rebuilds the in-memory action from its durable mirror.
    pub fn into_action(self) -> OptimisticAction {
        OptimisticAction {
            id: self.id,
            kind: self.kind,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            payload: self.payload,
            prior_state: self.prior_state,
            status: self.status,
            sequence: self.sequence,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            enqueued_at: self.created_at,
            error_message: self.error_message,
        }
    }
}

fn entity_url(base: &str, entity_id: Option<&str>) -> String {
    match entity_id {
        Some(id) => format!("{base}/{id}"),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_shape_follows_action_kind() {
        let add = OptimisticAction::new(
            ActionKind::Add,
            EntityType::Footprint,
            Some("fp-9".into()),
            ActionPayload::new(json!({"id": "fp-9"})).unwrap(),
            None,
            4,
            3,
        );
        let request = QueuedRequest::for_action(&add, 0);
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "/api/footprints");
        assert!(request.body.is_some());

        let delete = OptimisticAction::new(
            ActionKind::Delete,
            EntityType::Goal,
            Some("g-1".into()),
            ActionPayload::new(json!({"id": "g-1"})).unwrap(),
            None,
            5,
            3,
        );
        let request = QueuedRequest::for_action(&delete, 0);
        assert_eq!(request.method, "DELETE");
        assert_eq!(request.url, "/api/goals/g-1");
        assert!(request.body.is_none());
    }

    #[test]
    fn round_trips_to_action() {
        let action = OptimisticAction::new(
            ActionKind::Update,
            EntityType::Profile,
            Some("me".into()),
            ActionPayload::new(json!({"name": "A"})).unwrap(),
            Some(ActionPayload::new(json!({"name": "B"})).unwrap()),
            7,
            5,
        );
        let rebuilt = QueuedRequest::for_action(&action, 1).into_action();
        assert_eq!(rebuilt, action);
    }
}
