pub mod read_service;
pub mod sync_engine;
pub mod sync_queue;


pub use read_service::FootprintReadService;
pub use sync_engine::{EngineStatus, ReconcileReport, SyncEngine, SyncEvent};
pub use sync_queue::{EnqueueParams, SyncQueueService};
