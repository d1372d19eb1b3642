//! Queue capability consumed by the processor.
//!
//! Any queue that offers at-least-once delivery with a visibility timeout
//! (lease) can back the engine: a pulled message stays hidden from other
//! consumers until it is acknowledged or its lease expires, after which it is
//! delivered again.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque token identifying one lease of one message.
///
/// Only the most recent receipt of a message can acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message leased from a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Broker-assigned identifier, stable across redeliveries.
    pub message_id: String,
    /// Raw payload.
    pub body: Vec<u8>,
    /// Lease token required to acknowledge the message.
    pub receipt: ReceiptHandle,
    /// Approximate time the message was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// How many times the message has been handed out, this lease included.
    pub receive_count: u32,
}

/// Parameters for a single pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullRequest {
    /// Upper bound on the batch size.
    pub max_messages: usize,
    /// Long-poll budget: how long to wait for at least one message.
    pub wait: Duration,
    /// Lease length applied to every returned message.
    pub visibility_timeout: Duration,
}

impl Default for PullRequest {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait: Duration::from_secs(20),
            visibility_timeout: Duration::from_secs(30),
        }
    }
}

/// Transient queue failures. None of these are fatal to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("receipt is no longer valid: {0}")]
    StaleReceipt(String),

    #[error("queue backend error: {0}")]
    Backend(String),
}

/// Future type returned by queue operations.
pub type QueueFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QueueError>> + Send + 'a>>;

/// Consumer side of a queue.
pub trait QueueClient: Send + Sync + 'static {
    /// Lease up to `request.max_messages` visible messages, waiting up to
    /// `request.wait` for at least one. An empty batch is not an error.
    fn pull(&self, request: PullRequest) -> QueueFuture<'_, Vec<QueueMessage>>;

    /// Delete the message leased under `receipt`.
    fn ack<'a>(&'a self, receipt: &'a ReceiptHandle) -> QueueFuture<'a, ()>;
}

/// Producer side of a queue.
pub trait QueuePublisher: Send + Sync + 'static {
    /// Append a message and return its broker-assigned identifier.
    fn publish(&self, body: Vec<u8>) -> QueueFuture<'_, String>;
}
