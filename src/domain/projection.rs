use crate::domain::entities::OptimisticAction;
use crate::domain::value_objects::{ActionKind, EntityType};
use serde_json::Value;

/// Re-derives what a server-confirmed list should look like once every
/// pending action has been applied. Pure: recomputing against a refreshed
/// base list always yields the same result for the same pending set.
///
/// Actions are replayed strictly in queue sequence order; wall-clock
/// timestamps play no part, so client clock skew cannot reorder them.
pub fn apply_optimistic(
    base: &[Value],
    entity_type: EntityType,
    pending: &[OptimisticAction],
) -> Vec<Value> {
    let mut actions: Vec<&OptimisticAction> = pending
        .iter()
        .filter(|action| action.is_pending() && action.entity_type == entity_type)
        .collect();
    actions.sort_by_key(|action| action.sequence);

    let mut projected: Vec<Value> = base.to_vec();

    for action in actions {
        match action.kind {
            ActionKind::Add => {
                projected.push(action.payload.as_json().clone());
            }
            ActionKind::Delete => {
                if let Some(target) = action_target(action) {
                    projected.retain(|item| item_id(item) != Some(target));
                }
            }
            ActionKind::Update => {
                if let Some(target) = action_target(action) {
                    for item in projected.iter_mut() {
                        if item_id(item) == Some(target) {
                            merge_object(item, action.payload.as_json());
                        }
                    }
                }
            }
        }
    }

    projected
}

fn action_target(action: &OptimisticAction) -> Option<&str> {
    action
        .entity_id
        .as_deref()
        .or_else(|| action.payload.as_json().get("id").and_then(Value::as_str))
}

fn item_id(item: &Value) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

fn merge_object(target: &mut Value, changes: &Value) {
    if let (Some(target), Some(changes)) = (target.as_object_mut(), changes.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::ActionPayload;
    use serde_json::json;

    fn action(
        kind: ActionKind,
        entity_id: &str,
        payload: Value,
        sequence: u64,
    ) -> OptimisticAction {
        OptimisticAction::new(
            kind,
            EntityType::Footprint,
            Some(entity_id.to_string()),
            ActionPayload::new(payload).unwrap(),
            None,
            sequence,
            3,
        )
    }

    fn base_list() -> Vec<Value> {
        vec![
            json!({"id": "fp-1", "co2e": 1.0}),
            json!({"id": "fp-2", "co2e": 2.0}),
        ]
    }

    #[test]
    fn replays_add_delete_update_in_order() {
        let pending = vec![
            action(ActionKind::Add, "fp-3", json!({"id": "fp-3", "co2e": 3.0}), 0),
            action(ActionKind::Delete, "fp-1", json!({"id": "fp-1"}), 1),
            action(ActionKind::Update, "fp-2", json!({"co2e": 9.0}), 2),
        ];

        let projected = apply_optimistic(&base_list(), EntityType::Footprint, &pending);

        assert_eq!(projected.len(), 2);
        assert_eq!(projected[0], json!({"id": "fp-2", "co2e": 9.0}));
        assert_eq!(projected[1], json!({"id": "fp-3", "co2e": 3.0}));
    }

    #[test]
    fn recomputation_is_stable() {
        let pending = vec![
            action(ActionKind::Add, "fp-3", json!({"id": "fp-3", "co2e": 3.0}), 0),
            action(ActionKind::Update, "fp-3", json!({"co2e": 4.0}), 1),
        ];

        let first = apply_optimistic(&base_list(), EntityType::Footprint, &pending);
        let second = apply_optimistic(&base_list(), EntityType::Footprint, &pending);

        assert_eq!(first, second);
        assert_eq!(first[2], json!({"id": "fp-3", "co2e": 4.0}));
    }

    #[test]
    fn sequence_order_wins_over_slice_order() {
        // Same actions supplied out of order must replay by sequence.
        let pending = vec![
            action(ActionKind::Delete, "fp-3", json!({"id": "fp-3"}), 1),
            action(ActionKind::Add, "fp-3", json!({"id": "fp-3", "co2e": 3.0}), 0),
        ];

        let projected = apply_optimistic(&base_list(), EntityType::Footprint, &pending);
        assert!(projected.iter().all(|item| item["id"] != json!("fp-3")));
    }

    #[test]
    fn ignores_other_entity_types_and_non_pending() {
        let mut failed = action(ActionKind::Delete, "fp-1", json!({"id": "fp-1"}), 0);
        failed.record_failure("boom".into());
        failed.record_failure("boom".into());
        failed.record_failure("boom".into());
        assert!(failed.is_failed());

        let mut goal = action(ActionKind::Delete, "fp-2", json!({"id": "fp-2"}), 1);
        goal.entity_type = EntityType::Goal;

        let projected =
            apply_optimistic(&base_list(), EntityType::Footprint, &[failed, goal]);
        assert_eq!(projected, base_list());
    }
}
