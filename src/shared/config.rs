use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Soft storage quota in bytes used by usage estimation.
    pub quota_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Periodic sweep re-attempting pending actions, in seconds.
    pub sweep_interval: u64,
    pub max_retries: u32,
    /// Upper bound on the exponential backoff delay, in seconds.
    pub backoff_ceiling: u64,
    /// Per-attempt network timeout, in seconds.
    pub attempt_timeout: u64,
    /// How long a succeeded action stays visible before removal, in seconds.
    pub success_grace: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl: u64,
    /// Interval of the active expiry sweep, in seconds.
    pub sweep_interval: u64,
    /// Per-operation TTLs for the read-through path, in seconds.
    pub summary_ttl: u64,
    pub search_ttl: u64,
    pub taxonomy_ttl: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/ecotrace.db".to_string(),
                max_connections: 5,
                quota_bytes: 50 * 1024 * 1024, // 50MB
            },
            sync: SyncConfig {
                sweep_interval: 30,
                max_retries: 3,
                backoff_ceiling: 60,
                attempt_timeout: 15,
                success_grace: 3,
            },
            cache: CacheConfig {
                max_entries: 1000,
                default_ttl: 300, // 5 minutes
                sweep_interval: 60,
                summary_ttl: 60,
                search_ttl: 300,
                taxonomy_ttl: 3600, // taxonomy lists rarely change
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("ECOTRACE_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v;
            }
        }
        if let Ok(v) = std::env::var("ECOTRACE_SYNC_SWEEP_INTERVAL") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.sweep_interval = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("ECOTRACE_SYNC_MAX_RETRIES") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.max_retries = value as u32;
            }
        }
        if let Ok(v) = std::env::var("ECOTRACE_SYNC_BACKOFF_CEILING") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.backoff_ceiling = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("ECOTRACE_CACHE_MAX_ENTRIES") {
            if let Some(value) = parse_u64(&v) {
                cfg.cache.max_entries = (value as usize).max(1);
            }
        }
        if let Ok(v) = std::env::var("ECOTRACE_CACHE_DEFAULT_TTL") {
            if let Some(value) = parse_u64(&v) {
                cfg.cache.default_ttl = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("ECOTRACE_CACHE_SWEEP_INTERVAL") {
            if let Some(value) = parse_u64(&v) {
                cfg.cache.sweep_interval = value.max(1);
            }
        }

        cfg
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
