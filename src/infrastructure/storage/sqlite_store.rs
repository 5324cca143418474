use crate::application::ports::store::{OfflineStore, StorageUsage};
use crate::domain::entities::{OfflineRecord, QueuedRequest};
use crate::domain::value_objects::{ActionId, CacheKey, EntityType};
use crate::infrastructure::storage::mappers::{record_from_row, request_from_row};
use crate::infrastructure::storage::rows::{OfflineRecordRow, ResponseCacheRow, SyncQueueRow};
use crate::shared::config::DatabaseConfig;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

/// SQLite-backed durable store for the four offline collections. One
/// writer per device; concurrent owners of the same file rely on the
/// idempotent queue semantics and last-write-wins settings.
pub struct SqliteOfflineStore {
    pool: Pool<Sqlite>,
    quota_bytes: u64,
}

impl SqliteOfflineStore {
    pub fn new(pool: Pool<Sqlite>, quota_bytes: u64) -> Self {
        Self { pool, quota_bytes }
    }

    /// Opens the database and applies migrations. A store that cannot
    /// initialize is an explicit error; everything downstream assumes
    /// durability.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool, config.quota_bytes))
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl OfflineStore for SqliteOfflineStore {
    async fn put_record(&self, record: &OfflineRecord) -> Result<()> {
        let data = serde_json::to_string(&record.data)?;
        sqlx::query(
            r#"
            INSERT INTO offline_records (id, entity_type, data, created_at, last_modified_at, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                entity_type = excluded.entity_type,
                data = excluded.data,
                last_modified_at = excluded.last_modified_at,
                synced = excluded.synced
            "#,
        )
        .bind(&record.id)
        .bind(record.entity_type.as_str())
        .bind(&data)
        .bind(record.created_at.timestamp_millis())
        .bind(record.last_modified_at.timestamp_millis())
        .bind(record.synced)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_records(&self, entity_type: Option<EntityType>) -> Result<Vec<OfflineRecord>> {
        let rows = match entity_type {
            Some(entity_type) => {
                sqlx::query_as::<_, OfflineRecordRow>(
                    r#"
                    SELECT * FROM offline_records
                    WHERE entity_type = ?1
                    ORDER BY last_modified_at DESC
                    "#,
                )
                .bind(entity_type.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OfflineRecordRow>(
                    "SELECT * FROM offline_records ORDER BY last_modified_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(record_from_row).collect()
    }

    async fn get_record(&self, id: &str) -> Result<Option<OfflineRecord>> {
        let row = sqlx::query_as::<_, OfflineRecordRow>(
            "SELECT * FROM offline_records WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn update_record(&self, id: &str, partial: &Value) -> Result<OfflineRecord> {
        let mut record = self
            .get_record(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("offline record {id}")))?;

        let previous_modified = record.last_modified_at;
        record.merge_update(partial);
        // Guard monotonicity even against a clock that stepped backwards.
        if record.last_modified_at <= previous_modified {
            record.last_modified_at = previous_modified + chrono::Duration::milliseconds(1);
        }

        self.put_record(&record).await?;
        Ok(record)
    }

    async fn mark_record_synced(&self, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE offline_records SET synced = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("offline record {id}")));
        }
        Ok(())
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM offline_records WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn enqueue_request(&self, request: &QueuedRequest) -> Result<()> {
        let body = request.body.as_ref().map(serde_json::to_string).transpose()?;
        let headers = serde_json::to_string(&request.headers)?;
        let payload = serde_json::to_string(request.payload.as_json())?;
        let prior_state = request
            .prior_state
            .as_ref()
            .map(|state| serde_json::to_string(state.as_json()))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO sync_queue (
                id, kind, entity_type, entity_id, method, url, body, headers,
                payload, prior_state, status, priority, seq, retry_count,
                max_retries, created_at, updated_at, error_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                retry_count = excluded.retry_count,
                updated_at = excluded.updated_at,
                error_message = excluded.error_message
            "#,
        )
        .bind(request.id.as_str())
        .bind(request.kind.as_str())
        .bind(request.entity_type.as_str())
        .bind(&request.entity_id)
        .bind(&request.method)
        .bind(&request.url)
        .bind(body)
        .bind(headers)
        .bind(payload)
        .bind(prior_state)
        .bind(request.status.as_str())
        .bind(request.priority as i64)
        .bind(request.sequence as i64)
        .bind(request.retry_count as i64)
        .bind(request.max_retries as i64)
        .bind(request.created_at.timestamp_millis())
        .bind(request.updated_at.timestamp_millis())
        .bind(&request.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_requests(&self) -> Result<Vec<QueuedRequest>> {
        let rows = sqlx::query_as::<_, SyncQueueRow>(
            "SELECT * FROM sync_queue ORDER BY priority DESC, seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(request_from_row).collect()
    }

    async fn update_request(&self, request: &QueuedRequest) -> Result<()> {
        // Item may already be gone if another owner finished it; that is
        // not an error.
        sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = ?1, retry_count = ?2, updated_at = ?3, error_message = ?4
            WHERE id = ?5
            "#,
        )
        .bind(request.status.as_str())
        .bind(request.retry_count as i64)
        .bind(Utc::now().timestamp_millis())
        .bind(&request.error_message)
        .bind(request.id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_request(&self, id: &ActionId) -> Result<()> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_retry(&self, id: &ActionId) -> Result<Option<u32>> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT retry_count, max_retries FROM sync_queue WHERE id = ?1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        let Some((retry_count, max_retries)) = row else {
            return Ok(None);
        };

        let next = retry_count + 1;
        if next >= max_retries {
            self.remove_request(id).await?;
            return Ok(None);
        }

        sqlx::query("UPDATE sync_queue SET retry_count = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(next)
            .bind(Utc::now().timestamp_millis())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(Some(next as u32))
    }

    async fn cache_put(&self, key: &CacheKey, value: &Value, ttl_seconds: i64) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let payload = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO response_cache (cache_key, payload, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key.as_str())
        .bind(&payload)
        .bind(now)
        .bind(now + ttl_seconds * 1000)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cache_get(&self, key: &CacheKey) -> Result<Option<Value>> {
        let row = sqlx::query_as::<_, ResponseCacheRow>(
            "SELECT * FROM response_cache WHERE cache_key = ?1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if row.expires_at <= Utc::now().timestamp_millis() {
            self.cache_delete(key).await?;
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&row.payload)?))
    }

    async fn cache_delete(&self, key: &CacheKey) -> Result<()> {
        sqlx::query("DELETE FROM response_cache WHERE cache_key = ?1")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn estimate_usage(&self) -> Result<StorageUsage> {
        let pages: std::result::Result<(i64,), sqlx::Error> =
            sqlx::query_as("PRAGMA page_count").fetch_one(&self.pool).await;
        let page_size: std::result::Result<(i64,), sqlx::Error> =
            sqlx::query_as("PRAGMA page_size").fetch_one(&self.pool).await;

        let (Ok((pages,)), Ok((page_size,))) = (pages, page_size) else {
            // Platform does not expose usage; report zeros rather than fail.
            return Ok(StorageUsage::default());
        };

        let used = (pages * page_size).max(0) as u64;
        let quota = self.quota_bytes;
        let percentage = if quota == 0 {
            0.0
        } else {
            (used as f64 / quota as f64) * 100.0
        };
        Ok(StorageUsage {
            used,
            quota,
            percentage,
        })
    }

    async fn clear_all(&self) -> Result<()> {
        for table in ["offline_records", "sync_queue", "response_cache", "settings"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::OptimisticAction;
    use crate::domain::value_objects::{ActionKind, ActionPayload};
    use serde_json::json;

    async fn setup_store() -> SqliteOfflineStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteOfflineStore::new(pool, 1024 * 1024)
    }

    fn sample_request(sequence: u64, priority: i32) -> QueuedRequest {
        let action = OptimisticAction::new(
            ActionKind::Add,
            EntityType::Footprint,
            Some(format!("fp-{sequence}")),
            ActionPayload::new(json!({"id": format!("fp-{sequence}"), "co2e": 1.0})).unwrap(),
            None,
            sequence,
            3,
        );
        QueuedRequest::for_action(&action, priority)
    }

    #[tokio::test]
    async fn record_update_merges_and_stays_monotonic() {
        let store = setup_store().await;
        let record = OfflineRecord::new(
            "fp-1".into(),
            EntityType::Footprint,
            json!({"co2e": 1.0, "category": "food"}),
        );
        store.put_record(&record).await.unwrap();

        let updated = store
            .update_record("fp-1", &json!({"co2e": 2.0}))
            .await
            .unwrap();

        assert!(!updated.synced);
        assert!(updated.last_modified_at > record.last_modified_at);
        assert_eq!(updated.data["co2e"], json!(2.0));
        assert_eq!(updated.data["category"], json!("food"));

        store.mark_record_synced("fp-1").await.unwrap();
        let reloaded = store.get_record("fp-1").await.unwrap().unwrap();
        assert!(reloaded.synced);
    }

    #[tokio::test]
    async fn update_record_unknown_id_is_not_found() {
        let store = setup_store().await;
        let result = store.update_record("missing", &json!({})).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn queue_lists_by_priority_then_enqueue_order() {
        let store = setup_store().await;
        store.enqueue_request(&sample_request(0, 0)).await.unwrap();
        store.enqueue_request(&sample_request(1, 5)).await.unwrap();
        store.enqueue_request(&sample_request(2, 0)).await.unwrap();

        let listed = store.list_requests().await.unwrap();
        let order: Vec<u64> = listed.iter().map(|request| request.sequence).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[tokio::test]
    async fn increment_retry_deletes_at_the_ceiling() {
        let store = setup_store().await;
        let request = sample_request(0, 0);
        store.enqueue_request(&request).await.unwrap();

        assert_eq!(store.increment_retry(&request.id).await.unwrap(), Some(1));
        assert_eq!(store.increment_retry(&request.id).await.unwrap(), Some(2));
        // Third failure reaches max_retries = 3: the item is dropped.
        assert_eq!(store.increment_retry(&request.id).await.unwrap(), None);
        assert!(store.list_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn removing_a_removed_item_is_a_noop() {
        let store = setup_store().await;
        let request = sample_request(0, 0);
        store.enqueue_request(&request).await.unwrap();

        store.remove_request(&request.id).await.unwrap();
        store.remove_request(&request.id).await.unwrap();
        assert_eq!(store.increment_retry(&request.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn response_cache_expires_on_read() {
        let store = setup_store().await;
        let key = CacheKey::new("summary:user:1:month".into()).unwrap();

        store.cache_put(&key, &json!({"total": 4.2}), 60).await.unwrap();
        assert_eq!(
            store.cache_get(&key).await.unwrap(),
            Some(json!({"total": 4.2}))
        );

        store.cache_put(&key, &json!({"total": 4.2}), -1).await.unwrap();
        assert_eq!(store.cache_get(&key).await.unwrap(), None);
        // The expired row was deleted, not just skipped.
        let rows: Vec<ResponseCacheRow> =
            sqlx::query_as("SELECT * FROM response_cache")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn settings_are_last_write_wins() {
        let store = setup_store().await;
        store.set_setting("sync.last_drain_at", "100").await.unwrap();
        store.set_setting("sync.last_drain_at", "200").await.unwrap();
        assert_eq!(
            store.get_setting("sync.last_drain_at").await.unwrap(),
            Some("200".to_string())
        );
    }

    #[tokio::test]
    async fn usage_reports_pages_and_quota() {
        let store = setup_store().await;
        let usage = store.estimate_usage().await.unwrap();
        assert!(usage.used > 0);
        assert_eq!(usage.quota, 1024 * 1024);
        assert!(usage.percentage > 0.0);
    }

    #[tokio::test]
    async fn clear_all_empties_every_collection() {
        let store = setup_store().await;
        store
            .put_record(&OfflineRecord::new(
                "fp-1".into(),
                EntityType::Footprint,
                json!({"co2e": 1.0}),
            ))
            .await
            .unwrap();
        store.enqueue_request(&sample_request(0, 0)).await.unwrap();
        store.set_setting("k", "v").await.unwrap();

        store.clear_all().await.unwrap();

        assert!(store.get_records(None).await.unwrap().is_empty());
        assert!(store.list_requests().await.unwrap().is_empty());
        assert_eq!(store.get_setting("k").await.unwrap(), None);
    }
}
