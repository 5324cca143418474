pub mod offline_record;
pub mod optimistic_action;
pub mod queued_request;

pub use offline_record::OfflineRecord;
pub use optimistic_action::OptimisticAction;
pub use queued_request::QueuedRequest;
