//! Shared counters updated by every worker.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use order_core::StatsSnapshot;
use tokio::time::Instant;

/// Lock-free processor counters.
///
/// Updates from many workers never lose increments. A [`snapshot`](Self::snapshot)
/// reads each counter atomically but not all of them at the same instant.
#[derive(Debug)]
pub struct ProcessorStats {
    received: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    active_workers: AtomicU32,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl ProcessorStats {
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            active_workers: AtomicU32::new(0),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_stopped(&self) {
        let _ = self
            .active_workers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            uptime: self.started.elapsed(),
            started_at: self.started_at,
        }
    }
}

impl Default for ProcessorStats {
    fn default() -> Self {
        Self::new()
    }
}
