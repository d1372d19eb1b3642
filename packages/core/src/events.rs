//! Event types for observing the processor in real time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage at which a message was classified as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The payload could not be decoded (poison message).
    Decode,
    /// The payment operation itself failed.
    Operation,
}

/// Events emitted by the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcessorEvent {
    // Worker events
    /// A worker started polling.
    WorkerStarted {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker exited its loop.
    WorkerStopped {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },

    // Message events
    /// A message was acknowledged after its order completed.
    OrderCompleted {
        order_id: String,
        message_id: String,
        worker_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A message was left unacknowledged.
    OrderFailed {
        order_id: Option<String>,
        message_id: String,
        worker_id: String,
        stage: FailureStage,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Acknowledging a completed order failed; the message will come back.
    AckFailed {
        order_id: String,
        message_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ProcessorEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ProcessorEvent::WorkerStarted { timestamp, .. } => *timestamp,
            ProcessorEvent::WorkerStopped { timestamp, .. } => *timestamp,
            ProcessorEvent::OrderCompleted { timestamp, .. } => *timestamp,
            ProcessorEvent::OrderFailed { timestamp, .. } => *timestamp,
            ProcessorEvent::AckFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the message ID associated with this event, if any.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            ProcessorEvent::OrderCompleted { message_id, .. }
            | ProcessorEvent::OrderFailed { message_id, .. }
            | ProcessorEvent::AckFailed { message_id, .. } => Some(message_id),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            ProcessorEvent::WorkerStarted { worker_id, .. } => {
                format!("Worker {} started", worker_id)
            }
            ProcessorEvent::WorkerStopped { worker_id, .. } => {
                format!("Worker {} stopped", worker_id)
            }
            ProcessorEvent::OrderCompleted {
                order_id,
                duration_ms,
                ..
            } => format!("Order {} completed in {}ms", order_id, duration_ms),
            ProcessorEvent::OrderFailed {
                order_id,
                message_id,
                error,
                ..
            } => match order_id {
                Some(order_id) => format!("Order {} failed: {}", order_id, error),
                None => format!("Message {} failed: {}", message_id, error),
            },
            ProcessorEvent::AckFailed {
                order_id, error, ..
            } => format!("Ack for order {} failed: {}", order_id, error),
        }
    }
}
