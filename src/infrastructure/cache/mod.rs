pub mod bounded_cache;
pub mod stats;

pub use bounded_cache::BoundedCache;
pub use stats::CacheStats;
