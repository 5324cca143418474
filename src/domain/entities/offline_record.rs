use crate::domain::value_objects::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Durable local copy of a domain entity, editable before any network round
/// trip exists. `synced = false` means the server holds no guarantee of an
/// equivalent or newer version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfflineRecord {
    pub id: String,
    pub entity_type: EntityType,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub synced: bool,
}

impl OfflineRecord {
    pub fn new(id: String, entity_type: EntityType, data: Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            entity_type,
            data,
            created_at: now,
            last_modified_at: now,
            synced: false,
        }
    }

    /// Merges a partial JSON object into the record and marks it unsynced.
    /// `last_modified_at` only ever moves forward.
    pub fn merge_update(&mut self, partial: &Value) {
        if let (Some(target), Some(changes)) = (self.data.as_object_mut(), partial.as_object()) {
            for (key, value) in changes {
                target.insert(key.clone(), value.clone());
            }
        }
        let now = Utc::now();
        if now > self.last_modified_at {
            self.last_modified_at = now;
        }
        self.synced = false;
    }

    pub fn mark_synced(&mut self) {
        self.synced = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_update_marks_unsynced_and_advances_timestamp() {
        let mut record = OfflineRecord::new(
            "fp-1".into(),
            EntityType::Footprint,
            json!({"co2e": 1.0, "category": "food"}),
        );
        record.mark_synced();
        let before = record.last_modified_at;

        record.merge_update(&json!({"co2e": 2.5}));

        assert!(!record.synced);
        assert!(record.last_modified_at >= before);
        assert_eq!(record.data["co2e"], json!(2.5));
        assert_eq!(record.data["category"], json!("food"));
    }
}
