//! In-process queue with lease semantics.
//!
//! Behaves like a hosted at-least-once queue: pulled messages become
//! invisible for the requested visibility timeout and reappear unless they
//! are acknowledged with their latest receipt. Time is read from the tokio
//! clock, so paused-time tests can drive lease expiry deterministically.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use order_core::{
    PullRequest, QueueClient, QueueError, QueueFuture, QueueMessage, QueuePublisher,
    ReceiptHandle,
};
use tokio::sync::Notify;
use tokio::time::Instant;
use ulid::Ulid;

/// A message removed from circulation after too many deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub message_id: String,
    pub body: Vec<u8>,
    pub receive_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

struct Entry {
    message_id: String,
    body: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    visible_at: Instant,
    receipt: Option<ReceiptHandle>,
    receive_count: u32,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    dead_letters: Vec<DeadLetter>,
    acked: u64,
}

impl Inner {
    fn lease(
        &mut self,
        now: Instant,
        request: PullRequest,
        max_receives: Option<u32>,
    ) -> Vec<QueueMessage> {
        let mut batch = Vec::new();
        let mut index = 0;

        while index < self.entries.len() && batch.len() < request.max_messages {
            let entry = &mut self.entries[index];
            if entry.visible_at > now {
                index += 1;
                continue;
            }

            if max_receives.is_some_and(|max| entry.receive_count >= max) {
                let entry = self.entries.remove(index);
                tracing::warn!(
                    message_id = %entry.message_id,
                    receive_count = entry.receive_count,
                    "Moving message to dead letters"
                );
                self.dead_letters.push(DeadLetter {
                    message_id: entry.message_id,
                    body: entry.body,
                    receive_count: entry.receive_count,
                    enqueued_at: entry.enqueued_at,
                });
                continue;
            }

            let receipt = ReceiptHandle::new(Ulid::new().to_string());
            entry.receive_count += 1;
            entry.visible_at = now + request.visibility_timeout;
            entry.receipt = Some(receipt.clone());

            batch.push(QueueMessage {
                message_id: entry.message_id.clone(),
                body: entry.body.clone(),
                receipt,
                enqueued_at: entry.enqueued_at,
                receive_count: entry.receive_count,
            });
            index += 1;
        }

        batch
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.entries.iter().map(|entry| entry.visible_at).min()
    }
}

/// Queue held entirely in memory.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
    published: Notify,
    max_receives: Option<u32>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dead-letter messages that were already delivered `max` times instead of
    /// handing them out again.
    pub fn with_max_receives(mut self, max: u32) -> Self {
        self.max_receives = Some(max.max(1));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message and return its id.
    pub fn push(&self, body: impl Into<Vec<u8>>) -> String {
        let message_id = Ulid::new().to_string();
        self.lock().entries.push(Entry {
            message_id: message_id.clone(),
            body: body.into(),
            enqueued_at: Utc::now(),
            visible_at: Instant::now(),
            receipt: None,
            receive_count: 0,
        });
        self.published.notify_waiters();
        message_id
    }

    /// Messages stored in the queue, leased or not.
    pub fn depth(&self) -> usize {
        self.lock().entries.len()
    }

    /// Messages that could be pulled right now.
    pub fn visible(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .entries
            .iter()
            .filter(|entry| entry.visible_at <= now)
            .count()
    }

    /// Messages currently leased to a consumer.
    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .entries
            .iter()
            .filter(|entry| entry.visible_at > now)
            .count()
    }

    /// Number of successful acknowledgements.
    pub fn acked(&self) -> u64 {
        self.lock().acked
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead_letters.clone()
    }
}

impl QueueClient for MemoryQueue {
    fn pull(&self, request: PullRequest) -> QueueFuture<'_, Vec<QueueMessage>> {
        Box::pin(async move {
            if request.max_messages == 0 {
                return Ok(Vec::new());
            }

            let deadline = Instant::now() + request.wait;
            loop {
                // Registered before scanning so a concurrent push is not missed.
                let published = self.published.notified();

                let next_visible = {
                    let mut inner = self.lock();
                    let batch = inner.lease(Instant::now(), request, self.max_receives);
                    if !batch.is_empty() {
                        return Ok(batch);
                    }
                    inner.next_visible_at()
                };

                if Instant::now() >= deadline {
                    return Ok(Vec::new());
                }

                let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
                tokio::select! {
                    _ = published => {}
                    _ = tokio::time::sleep_until(wake_at) => {}
                }
            }
        })
    }

    fn ack<'a>(&'a self, receipt: &'a ReceiptHandle) -> QueueFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            let position = inner
                .entries
                .iter()
                .position(|entry| entry.receipt.as_ref() == Some(receipt));

            match position {
                Some(index) => {
                    inner.entries.remove(index);
                    inner.acked += 1;
                    Ok(())
                }
                None => Err(QueueError::StaleReceipt(receipt.to_string())),
            }
        })
    }
}

impl QueuePublisher for MemoryQueue {
    fn publish(&self, body: Vec<u8>) -> QueueFuture<'_, String> {
        Box::pin(async move { Ok(self.push(body)) })
    }
}
