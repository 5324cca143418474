use crate::domain::entities::{OfflineRecord, QueuedRequest};
use crate::domain::value_objects::{
    ActionId, ActionKind, ActionPayload, ActionStatus, EntityType,
};
use crate::infrastructure::storage::rows::{OfflineRecordRow, SyncQueueRow};
use crate::shared::error::{AppError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub fn record_from_row(row: OfflineRecordRow) -> Result<OfflineRecord> {
    Ok(OfflineRecord {
        entity_type: EntityType::parse(&row.entity_type).map_err(AppError::ValidationError)?,
        data: serde_json::from_str(&row.data)?,
        created_at: datetime_from_millis(row.created_at)?,
        last_modified_at: datetime_from_millis(row.last_modified_at)?,
        synced: row.synced,
        id: row.id,
    })
}

pub fn request_from_row(row: SyncQueueRow) -> Result<QueuedRequest> {
    let headers: HashMap<String, String> = match row.headers {
        Some(raw) => serde_json::from_str(&raw)?,
        None => HashMap::new(),
    };

    Ok(QueuedRequest {
        id: ActionId::new(row.id).map_err(AppError::ValidationError)?,
        kind: ActionKind::parse(&row.kind).map_err(AppError::ValidationError)?,
        entity_type: EntityType::parse(&row.entity_type).map_err(AppError::ValidationError)?,
        entity_id: row.entity_id,
        method: row.method,
        url: row.url,
        body: row.body.as_deref().map(serde_json::from_str).transpose()?,
        headers,
        payload: ActionPayload::from_json_str(&row.payload).map_err(AppError::ValidationError)?,
        prior_state: row
            .prior_state
            .as_deref()
            .map(ActionPayload::from_json_str)
            .transpose()
            .map_err(AppError::ValidationError)?,
        status: ActionStatus::from(row.status.as_str()),
        priority: row.priority as i32,
        sequence: row.seq as u64,
        retry_count: row.retry_count as u32,
        max_retries: row.max_retries as u32,
        created_at: datetime_from_millis(row.created_at)?,
        updated_at: datetime_from_millis(row.updated_at)?,
        error_message: row.error_message,
    })
}

pub fn datetime_from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid timestamp: {millis}")))
}
