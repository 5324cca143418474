use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OfflineRecordRow {
    pub id: String,
    pub entity_type: String,
    pub data: String,
    pub created_at: i64,
    pub last_modified_at: i64,
    pub synced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncQueueRow {
    pub id: String,
    pub kind: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub method: String,
    pub url: String,
    pub body: Option<String>,
    pub headers: Option<String>,
    pub payload: String,
    pub prior_state: Option<String>,
    pub status: String,
    pub priority: i64,
    pub seq: i64,
    pub retry_count: i64,
    pub max_retries: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResponseCacheRow {
    pub cache_key: String,
    pub payload: String,
    pub created_at: i64,
    pub expires_at: i64,
}
