//! Core domain types for the order processing engine.
//!
//! This crate contains shared types used across all packages:
//! - Order, LineItem and OrderStatus for units of work
//! - Envelope and OrderDecoder for turning queue payloads into orders
//! - QueueMessage and the QueueClient/QueuePublisher capabilities
//! - StatsSnapshot and events for monitoring

mod decode;
mod envelope;
mod events;
mod lifecycle;
mod order;
mod queue;
mod stats;

pub use decode::{DecodeError, OrderDecoder};
pub use envelope::Envelope;
pub use events::{FailureStage, ProcessorEvent};
pub use lifecycle::ProcessorState;
pub use order::{LineItem, Order, OrderError, OrderStatus};
pub use queue::{
    PullRequest, QueueClient, QueueError, QueueFuture, QueueMessage, QueuePublisher, ReceiptHandle,
};
pub use stats::{StatsReport, StatsSnapshot};
