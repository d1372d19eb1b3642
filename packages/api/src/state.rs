//! Shared state for the HTTP intake.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use order_core::QueuePublisher;
use processor::{PaymentGate, ProcessorStats};
use serde::{Deserialize, Serialize};

/// Service name reported by the health endpoint.
pub const SERVICE_NAME: &str = "order-service";

/// Request counters for the intake endpoints.
#[derive(Debug, Default)]
pub struct IntakeStats {
    total_requests: AtomicU64,
    sync_orders: AtomicU64,
    async_orders: AtomicU64,
    successful_orders: AtomicU64,
    failed_orders: AtomicU64,
}

/// Wire shape of `GET /stats/intake`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeReport {
    pub total_requests: u64,
    pub sync_orders: u64,
    pub async_orders: u64,
    pub successful_orders: u64,
    pub failed_orders: u64,
    pub success_rate: f64,
}

impl IntakeStats {
    pub fn record_sync(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.sync_orders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_async(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.async_orders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful_orders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_orders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> IntakeReport {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let successful_orders = self.successful_orders.load(Ordering::Relaxed);
        let success_rate = if total_requests == 0 {
            0.0
        } else {
            successful_orders as f64 / total_requests as f64 * 100.0
        };

        IntakeReport {
            total_requests,
            sync_orders: self.sync_orders.load(Ordering::Relaxed),
            async_orders: self.async_orders.load(Ordering::Relaxed),
            successful_orders,
            failed_orders: self.failed_orders.load(Ordering::Relaxed),
            success_rate,
        }
    }
}

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Gate in front of the payment operation, shared with the processor.
    pub gate: Arc<PaymentGate>,
    /// Queue the async endpoint publishes to.
    pub publisher: Arc<dyn QueuePublisher>,
    /// Processor counters behind `GET /stats`.
    pub processor_stats: Arc<ProcessorStats>,
    pub intake: Arc<IntakeStats>,
}

impl AppState {
    pub fn new(
        gate: Arc<PaymentGate>,
        publisher: Arc<dyn QueuePublisher>,
        processor_stats: Arc<ProcessorStats>,
    ) -> Self {
        Self {
            gate,
            publisher,
            processor_stats,
            intake: Arc::new(IntakeStats::default()),
        }
    }
}
