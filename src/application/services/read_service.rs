use crate::application::ports::FootprintSource;
use crate::infrastructure::cache::BoundedCache;
use crate::shared::config::CacheConfig;
use crate::shared::error::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Read-through consumer of the bounded cache: expensive reads are served
/// from cache keyed by operation + normalized parameters, and every write
/// invalidates the affected namespace before returning.
pub struct FootprintReadService {
    cache: Arc<BoundedCache>,
    source: Arc<dyn FootprintSource>,
    summary_ttl: Duration,
    search_ttl: Duration,
    taxonomy_ttl: Duration,
}

impl FootprintReadService {
    pub fn new(
        cache: Arc<BoundedCache>,
        source: Arc<dyn FootprintSource>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            cache,
            source,
            summary_ttl: Duration::from_secs(config.summary_ttl),
            search_ttl: Duration::from_secs(config.search_ttl),
            taxonomy_ttl: Duration::from_secs(config.taxonomy_ttl),
        }
    }

    pub async fn search_products(&self, query: &str) -> Result<Vec<Value>> {
        let key = format!("product:search:{}", normalize_query(query));
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(as_list(cached));
        }

        let results = self.source.search_products(query).await?;
        self.cache
            .set_with_ttl(key, Value::Array(results.clone()), self.search_ttl)
            .await;
        Ok(results)
    }

    pub async fn user_summary(&self, user_id: &str, period: &str) -> Result<Value> {
        let key = format!("summary:user:{user_id}:period:{period}");
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let summary = self.source.user_summary(user_id, period).await?;
        self.cache
            .set_with_ttl(key, summary.clone(), self.summary_ttl)
            .await;
        Ok(summary)
    }

    pub async fn list_footprints(&self, user_id: &str) -> Result<Vec<Value>> {
        let key = format!("footprint:user:{user_id}:list");
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(as_list(cached));
        }

        let entries = self.source.list_footprints(user_id).await?;
        self.cache
            .set_with_ttl(key, Value::Array(entries.clone()), self.summary_ttl)
            .await;
        Ok(entries)
    }

    pub async fn categories(&self) -> Result<Vec<Value>> {
        self.taxonomy("taxonomy:categories").await
    }

    pub async fn brands(&self) -> Result<Vec<Value>> {
        self.taxonomy("taxonomy:brands").await
    }

    async fn taxonomy(&self, key: &str) -> Result<Vec<Value>> {
        if let Some(cached) = self.cache.get(key).await {
            return Ok(as_list(cached));
        }

        let items = match key {
            "taxonomy:brands" => self.source.brand_list().await?,
            _ => self.source.category_list().await?,
        };
        self.cache
            .set_with_ttl(key.to_string(), Value::Array(items.clone()), self.taxonomy_ttl)
            .await;
        Ok(items)
    }

    /// Writes go straight to the source of truth; the user's cached reads
    /// are invalidated before returning so the next read is fresh.
    pub async fn upsert_footprint(&self, user_id: &str, entry: &Value) -> Result<Value> {
        let stored = self.source.upsert_footprint(user_id, entry).await?;
        self.invalidate_user(user_id).await;
        Ok(stored)
    }

    pub async fn delete_footprint(&self, user_id: &str, entry_id: &str) -> Result<()> {
        self.source.delete_footprint(user_id, entry_id).await?;
        self.invalidate_user(user_id).await;
        Ok(())
    }

    async fn invalidate_user(&self, user_id: &str) {
        let summaries = self
            .cache
            .delete_pattern(&format!("summary:user:{user_id}:*"))
            .await;
        let lists = self
            .cache
            .delete_pattern(&format!("footprint:user:{user_id}:*"))
            .await;
        tracing::debug!(
            target: "cache::reads",
            user_id,
            invalidated = summaries + lists,
            "invalidated cached reads after write"
        );
    }
}

fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn as_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}
