use crate::infrastructure::cache::stats::{CacheStats, StatsCounters};
use crate::shared::config::CacheConfig;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

struct CacheEntry {
    value: Value,
    approx_bytes: u64,
    #[allow(dead_code)]
    created_at: Instant,
    expires_at: Instant,
    #[allow(dead_code)]
    last_accessed_at: Instant,
}

struct Inner {
    entries: LruCache<String, CacheEntry>,
    stats: StatsCounters,
}

/// Process-local cache with a bounded entry count, per-entry TTL, LRU
/// eviction and glob invalidation. The LRU order lives in the underlying
/// `LruCache`: reads refresh recency, the least recently used entry is
/// evicted first when at capacity.
///
/// Never shared across processes; multi-instance deployments accept
/// eventual cross-instance consistency.
pub struct BoundedCache {
    inner: Arc<RwLock<Inner>>,
    max_entries: usize,
    default_ttl: Duration,
    sweep_interval: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl BoundedCache {
    pub fn new(max_entries: usize, default_ttl_seconds: u64) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: LruCache::new(capacity),
                stats: StatsCounters::default(),
            })),
            max_entries: capacity.get(),
            default_ttl: Duration::from_secs(default_ttl_seconds),
            sweep_interval: Duration::from_secs(60),
            sweeper: Mutex::new(None),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::new(config.max_entries, config.default_ttl);
        cache.sweep_interval = Duration::from_secs(config.sweep_interval);
        cache
    }

    /// Returns the value for `key` unless absent or expired. A hit
    /// refreshes the entry's recency; an expired entry is evicted and
    /// counted as a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.last_accessed_at = now;
                let value = entry.value.clone();
                inner.stats.record_hit();
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            if let Some(entry) = inner.entries.pop(key) {
                inner.stats.estimated_memory =
                    inner.stats.estimated_memory.saturating_sub(entry.approx_bytes);
            }
        }
        inner.stats.record_miss();
        None
    }

    pub async fn set(&self, key: String, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    /// Inserts or overwrites an entry. At capacity, the least recently
    /// used entry is evicted first.
    pub async fn set_with_ttl(&self, key: String, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut inner = self.inner.write().await;

        let approx_bytes = match serde_json::to_vec(&value) {
            Ok(bytes) => (bytes.len() + key.len()) as u64,
            Err(err) => {
                // Estimation is bookkeeping only; a value that cannot be
                // sized is still cached.
                tracing::debug!(target: "cache::bounded", error = %err, "memory estimation failed");
                inner.stats.record_error();
                0
            }
        };

        let entry = CacheEntry {
            value,
            approx_bytes,
            created_at: now,
            expires_at: now + ttl,
            last_accessed_at: now,
        };

        if let Some((displaced_key, displaced)) = inner.entries.push(key.clone(), entry) {
            inner.stats.estimated_memory = inner
                .stats
                .estimated_memory
                .saturating_sub(displaced.approx_bytes);
            if displaced_key != key {
                inner.stats.record_eviction();
            }
        }
        inner.stats.estimated_memory += approx_bytes;
        inner.stats.record_set();
    }

    pub async fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.entries.pop(key) {
            Some(entry) => {
                inner.stats.estimated_memory =
                    inner.stats.estimated_memory.saturating_sub(entry.approx_bytes);
                true
            }
            None => false,
        }
    }

    /// Deletes every key matching the glob (`*` = any run of characters,
    /// anchored to the whole key). Returns the number removed.
    pub async fn delete_pattern(&self, pattern: &str) -> usize {
        let mut inner = self.inner.write().await;
        let matches: Vec<String> = inner
            .entries
            .iter()
            .filter(|(key, _)| glob_match(pattern, key.as_str()))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &matches {
            if let Some(entry) = inner.entries.pop(key) {
                inner.stats.estimated_memory =
                    inner.stats.estimated_memory.saturating_sub(entry.approx_bytes);
            }
        }
        matches.len()
    }

    pub async fn keys(&self, pattern: Option<&str>) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .filter(|key| pattern.map_or(true, |p| glob_match(p, key.as_str())))
            .collect()
    }

    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.stats.estimated_memory = 0;
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats::from_counters(&inner.stats, inner.entries.len(), self.max_entries)
    }

    /// Actively evicts everything past its TTL, bounding memory even for
    /// keys that are never read again. Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = inner.entries.pop(key) {
                inner.stats.estimated_memory =
                    inner.stats.estimated_memory.saturating_sub(entry.approx_bytes);
            }
        }
        expired.len()
    }

    /// Spawns the periodic expiry sweep. Idempotent.
    pub async fn start_sweeper(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_some() {
            return;
        }
        let cache = Arc::clone(self);
        let interval = self.sweep_interval;
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired().await;
                if removed > 0 {
                    tracing::debug!(target: "cache::bounded", removed, "expiry sweep");
                }
            }
        }));
    }

    /// Cancels the sweep task so tests and shutdown paths do not leak
    /// timers.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
        }
    }
}

/// Anchored glob match where `*` spans any run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = text;

    let first = parts[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];

    let last = parts[parts.len() - 1];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn evicts_least_recently_used_first() {
        let cache = BoundedCache::new(2, 300);
        cache.set("a".into(), json!(1)).await;
        cache.set("b".into(), json!(2)).await;
        cache.set("c".into(), json!(3)).await;

        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.get("b").await, Some(json!(2)));
        assert_eq!(cache.get("c").await, Some(json!(3)));
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn read_refreshes_recency() {
        let cache = BoundedCache::new(2, 300);
        cache.set("a".into(), json!(1)).await;
        cache.set("b".into(), json!(2)).await;
        cache.get("a").await;
        cache.set("c".into(), json!(3)).await;

        assert_eq!(cache.get("a").await, Some(json!(1)));
        assert!(cache.get("b").await.is_none());
        assert_eq!(cache.get("c").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_shrinks_the_cache() {
        let cache = BoundedCache::new(10, 300);
        cache
            .set_with_ttl("k".into(), json!("v"), Duration::from_millis(50))
            .await;
        assert_eq!(cache.len().await, 1);

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn delete_pattern_is_scoped_to_the_namespace() {
        let cache = BoundedCache::new(10, 300);
        cache.set("user:1:summary".into(), json!(1)).await;
        cache.set("user:2:summary".into(), json!(2)).await;

        let removed = cache.delete_pattern("user:1:*").await;

        assert_eq!(removed, 1);
        assert!(cache.get("user:1:summary").await.is_none());
        assert_eq!(cache.get("user:2:summary").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn keys_filters_by_glob() {
        let cache = BoundedCache::new(10, 300);
        cache.set("summary:user:1:month".into(), json!(1)).await;
        cache.set("summary:user:2:month".into(), json!(2)).await;
        cache.set("taxonomy:categories".into(), json!(3)).await;

        let mut keys = cache.keys(Some("summary:*")).await;
        keys.sort();
        assert_eq!(
            keys,
            vec!["summary:user:1:month", "summary:user:2:month"]
        );
        assert_eq!(cache.keys(None).await.len(), 3);
    }

    #[tokio::test]
    async fn sweep_evicts_cold_expired_entries() {
        let cache = BoundedCache::new(10, 300);
        cache
            .set_with_ttl("cold".into(), json!(1), Duration::from_millis(30))
            .await;
        cache.set("warm".into(), json!(2)).await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.sweep_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("warm").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn stats_track_activity() {
        let cache = BoundedCache::new(10, 300);
        cache.set("k".into(), json!({"v": 1})).await;
        cache.get("k").await;
        cache.get("missing").await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.max_size, 10);
        assert_eq!(stats.hit_rate, 0.5);
        assert!(stats.estimated_memory > 0);
    }

    #[tokio::test]
    async fn has_delegates_to_get() {
        let cache = BoundedCache::new(2, 300);
        cache.set("a".into(), json!(1)).await;
        cache.set("b".into(), json!(2)).await;

        assert!(cache.has("a").await);
        // `has` refreshed `a`, so `b` is now the eviction candidate.
        cache.set("c".into(), json!(3)).await;
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
    }

    #[tokio::test]
    async fn sweeper_runs_until_shutdown() {
        let config = CacheConfig {
            max_entries: 10,
            default_ttl: 300,
            sweep_interval: 1,
            summary_ttl: 60,
            search_ttl: 300,
            taxonomy_ttl: 3600,
        };
        let cache = Arc::new(BoundedCache::from_config(&config));
        cache
            .set_with_ttl("stale".into(), json!(1), Duration::from_millis(50))
            .await;

        cache.start_sweeper().await;
        cache.start_sweeper().await; // idempotent

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(cache.len().await, 0);

        cache.shutdown().await;
        cache.shutdown().await; // tolerates repeated shutdown
    }

    #[test]
    fn glob_match_is_anchored() {
        assert!(glob_match("user:1:*", "user:1:summary"));
        assert!(!glob_match("user:1:*", "auser:1:summary"));
        assert!(glob_match("*:summary", "user:2:summary"));
        assert!(glob_match("user:*:summary", "user:42:summary"));
        assert!(!glob_match("user:*:summary", "user:42:list"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
        assert!(glob_match("*", "anything"));
    }
}
