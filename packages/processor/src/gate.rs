//! Concurrency gate in front of the payment operation.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::operation::{GatedOperation, OperationError};

/// How long one gated execution spent waiting and running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTiming {
    /// Time spent waiting for a free slot.
    pub queued: Duration,
    /// Time spent inside the operation.
    pub ran: Duration,
}

impl ExecutionTiming {
    pub fn total(&self) -> Duration {
        self.queued + self.ran
    }
}

/// Bounds how many executions of the wrapped operation run at once.
///
/// At most `capacity` calls to [`execute`](Self::execute) are inside the
/// operation at any instant; further callers wait for a slot. A slot is
/// returned when the execution finishes or is cancelled, including when the
/// operation fails or panics. A panic is reported as
/// [`OperationError::Panicked`].
pub struct PaymentGate {
    slots: Semaphore,
    capacity: usize,
    operation: Arc<dyn GatedOperation>,
}

impl PaymentGate {
    /// Create a gate with `capacity` slots. A capacity of zero is treated as one.
    pub fn new(capacity: usize, operation: impl GatedOperation) -> Self {
        Self::from_arc(capacity, Arc::new(operation))
    }

    pub fn from_arc(capacity: usize, operation: Arc<dyn GatedOperation>) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Semaphore::new(capacity),
            capacity,
            operation,
        }
    }

    /// Run the operation for `order_id` once a slot is free.
    pub async fn execute(&self, order_id: &str) -> Result<ExecutionTiming, OperationError> {
        let requested = Instant::now();
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| OperationError::GateClosed)?;

        let started = Instant::now();
        let queued = started - requested;
        tracing::debug!(
            order_id,
            operation = self.operation.name(),
            queued_ms = queued.as_millis() as u64,
            "Processing payment"
        );

        let run = AssertUnwindSafe(async { self.operation.run(order_id).await });
        match run.catch_unwind().await {
            Ok(result) => result?,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    order_id,
                    operation = self.operation.name(),
                    %message,
                    "Payment operation panicked"
                );
                return Err(OperationError::Panicked {
                    order_id: order_id.to_string(),
                    message,
                });
            }
        }

        Ok(ExecutionTiming {
            queued,
            ran: started.elapsed(),
        })
    }

    /// Refuse new executions. Executions already holding a slot finish
    /// normally; waiting and later callers get [`OperationError::GateClosed`].
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by an execution.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available_slots())
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for PaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGate")
            .field("capacity", &self.capacity)
            .field("available", &self.available_slots())
            .field("operation", &self.operation.name())
            .finish()
    }
}
