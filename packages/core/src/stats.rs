//! Point-in-time processor statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable copy of the processor counters at one instant.
///
/// Each counter is read atomically, but the counters are not read as a
/// single transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub processed: u64,
    pub failed: u64,
    pub active_workers: u32,
    pub uptime: Duration,
    pub started_at: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Processed messages as a percentage of received ones, 0 before any
    /// message arrives.
    pub fn success_rate_percent(&self) -> f64 {
        if self.received == 0 {
            0.0
        } else {
            self.processed as f64 / self.received as f64 * 100.0
        }
    }

    /// Processed messages per second of uptime.
    pub fn throughput_per_sec(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.processed as f64 / secs
        }
    }

    /// Messages received but not yet settled either way.
    pub fn in_flight(&self) -> u64 {
        self.received.saturating_sub(self.processed + self.failed)
    }
}

/// Wire shape of the stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub received_count: u64,
    pub processed_count: u64,
    pub failed_count: u64,
    pub success_rate_percent: f64,
    pub active_workers: u32,
    pub uptime_seconds: u64,
}

impl From<&StatsSnapshot> for StatsReport {
    fn from(snapshot: &StatsSnapshot) -> Self {
        Self {
            received_count: snapshot.received,
            processed_count: snapshot.processed,
            failed_count: snapshot.failed,
            success_rate_percent: snapshot.success_rate_percent(),
            active_workers: snapshot.active_workers,
            uptime_seconds: snapshot.uptime.as_secs(),
        }
    }
}
