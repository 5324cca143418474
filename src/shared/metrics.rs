use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOutcome {
    Success,
    Failure,
}

/// Point-in-time view of replay attempt accounting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMetricsSnapshot {
    pub total_success: u64,
    pub total_failure: u64,
    pub consecutive_failure: u64,
    pub last_success_ms: Option<u64>,
    pub last_failure_ms: Option<u64>,
    pub last_outcome: Option<ReplayOutcome>,
    pub last_action_id: Option<String>,
    pub last_trigger: Option<String>,
    pub last_retry_count: Option<u32>,
    pub last_backoff_ms: Option<u64>,
}

#[derive(Default, Clone)]
struct LastReplayMetadata {
    last_outcome: Option<ReplayOutcome>,
    action_id: Option<String>,
    trigger: Option<String>,
    retry_count: Option<u32>,
    backoff_ms: Option<u64>,
}

struct ReplayMetrics {
    success: AtomicU64,
    failure: AtomicU64,
    consecutive_failure: AtomicU64,
    last_success_ms: AtomicU64,
    last_failure_ms: AtomicU64,
    metadata: Mutex<LastReplayMetadata>,
}

impl ReplayMetrics {
    fn new() -> Self {
        Self {
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            consecutive_failure: AtomicU64::new(0),
            last_success_ms: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            metadata: Mutex::new(LastReplayMetadata::default()),
        }
    }

    fn record(
        &self,
        outcome: ReplayOutcome,
        action_id: &str,
        trigger: &str,
        retry_count: u32,
        backoff_ms: Option<u64>,
    ) {
        match outcome {
            ReplayOutcome::Success => {
                self.success.fetch_add(1, Ordering::Relaxed);
                self.last_success_ms
                    .store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_failure.store(0, Ordering::Relaxed);
            }
            ReplayOutcome::Failure => {
                self.failure.fetch_add(1, Ordering::Relaxed);
                self.last_failure_ms
                    .store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_failure.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Ok(mut guard) = self.metadata.lock() {
            guard.last_outcome = Some(outcome);
            guard.action_id = Some(action_id.to_string());
            guard.trigger = Some(trigger.to_string());
            guard.retry_count = Some(retry_count);
            guard.backoff_ms = backoff_ms;
        }
    }

    fn snapshot(&self) -> ReplayMetricsSnapshot {
        let metadata = self
            .metadata
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();

        ReplayMetricsSnapshot {
            total_success: self.success.load(Ordering::Relaxed),
            total_failure: self.failure.load(Ordering::Relaxed),
            consecutive_failure: self.consecutive_failure.load(Ordering::Relaxed),
            last_success_ms: to_option(self.last_success_ms.load(Ordering::Relaxed)),
            last_failure_ms: to_option(self.last_failure_ms.load(Ordering::Relaxed)),
            last_outcome: metadata.last_outcome,
            last_action_id: metadata.action_id,
            last_trigger: metadata.trigger,
            last_retry_count: metadata.retry_count,
            last_backoff_ms: metadata.backoff_ms,
        }
    }
}

fn to_option(value: u64) -> Option<u64> {
    if value == 0 { None } else { Some(value) }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

static REPLAY_METRICS: LazyLock<ReplayMetrics> = LazyLock::new(ReplayMetrics::new);

pub fn record_replay_outcome(
    outcome: ReplayOutcome,
    action_id: &str,
    trigger: &str,
    retry_count: u32,
    backoff_ms: Option<u64>,
) -> ReplayMetricsSnapshot {
    REPLAY_METRICS.record(outcome, action_id, trigger, retry_count, backoff_ms);
    REPLAY_METRICS.snapshot()
}

pub fn replay_metrics_snapshot() -> ReplayMetricsSnapshot {
    REPLAY_METRICS.snapshot()
}
