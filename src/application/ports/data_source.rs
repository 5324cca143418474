use crate::shared::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Authoritative server-side data source the bounded cache shields.
/// Called only on cache miss (reads) or directly (writes).
#[async_trait]
pub trait FootprintSource: Send + Sync {
    async fn search_products(&self, query: &str) -> Result<Vec<Value>>;
    async fn user_summary(&self, user_id: &str, period: &str) -> Result<Value>;
    async fn list_footprints(&self, user_id: &str) -> Result<Vec<Value>>;
    async fn category_list(&self) -> Result<Vec<Value>>;
    async fn brand_list(&self) -> Result<Vec<Value>>;

    async fn upsert_footprint(&self, user_id: &str, entry: &Value) -> Result<Value>;
    async fn delete_footprint(&self, user_id: &str, entry_id: &str) -> Result<()>;
}
