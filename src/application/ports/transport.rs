use crate::domain::entities::QueuedRequest;
use crate::shared::error::Result;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub ok: bool,
    pub status: u16,
    pub body: Option<Value>,
}

impl TransportResponse {
    pub fn success(status: u16, body: Option<Value>) -> Self {
        Self {
            ok: (200..300).contains(&status),
            status,
            body,
        }
    }
}

/// Network transport the sync engine replays queued requests through.
/// A non-2xx response or an `Err` both count as a failed attempt.
#[async_trait]
pub trait ReplayTransport: Send + Sync {
    async fn send(&self, request: &QueuedRequest) -> Result<TransportResponse>;
}
