use crate::domain::entities::{OfflineRecord, QueuedRequest};
use crate::domain::value_objects::{ActionId, CacheKey, EntityType};
use crate::shared::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// On-device storage usage, where the platform exposes it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageUsage {
    pub used: u64,
    pub quota: u64,
    pub percentage: f64,
}

/// Durable, indexed, multi-collection device store: offline records, the
/// sync work queue, a TTL response cache, and key-value settings.
///
/// Every operation is async and propagates failures; dependents assume
/// durability, so a broken store must never be silently swallowed.
#[async_trait]
pub trait OfflineStore: Send + Sync {
    // offline records
    async fn put_record(&self, record: &OfflineRecord) -> Result<()>;
    async fn get_records(&self, entity_type: Option<EntityType>) -> Result<Vec<OfflineRecord>>;
    async fn get_record(&self, id: &str) -> Result<Option<OfflineRecord>>;
    /// Merges a partial JSON object into the record, marks it unsynced and
    /// bumps `last_modified_at`. Errors with `NotFound` for unknown ids.
    async fn update_record(&self, id: &str, partial: &Value) -> Result<OfflineRecord>;
    async fn mark_record_synced(&self, id: &str) -> Result<()>;
    async fn delete_record(&self, id: &str) -> Result<()>;

    // sync work queue
    async fn enqueue_request(&self, request: &QueuedRequest) -> Result<()>;
    /// All queue items, priority descending then enqueue order ascending.
    async fn list_requests(&self) -> Result<Vec<QueuedRequest>>;
    /// Mirrors status/retry bookkeeping of an existing item.
    async fn update_request(&self, request: &QueuedRequest) -> Result<()>;
    /// No-op (not an error) when the item is already gone, so concurrent
    /// processors can race removal safely.
    async fn remove_request(&self, id: &ActionId) -> Result<()>;
    /// Bumps the retry counter and returns the new count. Once the counter
    /// reaches the item's `max_retries` the item is deleted instead and
    /// `None` is returned.
    async fn increment_retry(&self, id: &ActionId) -> Result<Option<u32>>;

    // response cache
    async fn cache_put(&self, key: &CacheKey, value: &Value, ttl_seconds: i64) -> Result<()>;
    /// Returns `None` and deletes the row once past expiry.
    async fn cache_get(&self, key: &CacheKey) -> Result<Option<Value>>;
    async fn cache_delete(&self, key: &CacheKey) -> Result<()>;

    // settings (last-write-wins across concurrent owners)
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    async fn estimate_usage(&self) -> Result<StorageUsage>;
    async fn clear_all(&self) -> Result<()>;
}
