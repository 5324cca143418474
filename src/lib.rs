//! Offline-first synchronization and caching core for the ecotrace carbon
//! tracker.
//!
//! Client side: an optimistic action queue ([`SyncQueueService`]) mirrored
//! into a durable SQLite store ([`SqliteOfflineStore`]), drained by a
//! retrying [`SyncEngine`]. Server side: a bounded TTL/LRU cache
//! ([`BoundedCache`]) consumed read-through by [`FootprintReadService`],
//! which invalidates affected namespaces on every write.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::{
    FootprintSource, OfflineStore, ReplayTransport, StorageUsage, TransportResponse,
};
pub use application::services::{
    EngineStatus, EnqueueParams, FootprintReadService, ReconcileReport, SyncEngine, SyncEvent,
    SyncQueueService,
};
pub use domain::entities::{OfflineRecord, OptimisticAction, QueuedRequest};
pub use domain::projection::apply_optimistic;
pub use domain::value_objects::{
    ActionId, ActionKind, ActionPayload, ActionStatus, CacheKey, EntityType,
};
pub use infrastructure::cache::{BoundedCache, CacheStats};
pub use infrastructure::storage::SqliteOfflineStore;
pub use shared::config::AppConfig;
pub use shared::error::{AppError, Result};
pub use shared::logging::init_logging;
