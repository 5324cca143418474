pub mod data_source;
pub mod store;
pub mod transport;

pub use data_source::FootprintSource;
pub use store::{OfflineStore, StorageUsage};
pub use transport::{ReplayTransport, TransportResponse};
