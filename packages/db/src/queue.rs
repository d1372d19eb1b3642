//! Durable queue on top of the message repository.

use std::time::Duration;

use chrono::Utc;
use order_core::{
    PullRequest, QueueClient, QueueError, QueueFuture, QueueMessage, QueuePublisher,
    ReceiptHandle,
};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use ulid::Ulid;

use crate::DbError;
use crate::repositories::MessageRepository;

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Queue stored in the `queue_message` table.
///
/// Leases are compare-and-set updates on the message's visibility time, so a
/// message is handed to at most one consumer per lease. Pulls from the same
/// process are additionally serialized.
pub struct SurrealQueue {
    lease_lock: Mutex<()>,
    published: Notify,
    poll_interval: Duration,
}

impl SurrealQueue {
    pub fn new() -> Self {
        Self {
            lease_lock: Mutex::new(()),
            published: Notify::new(),
            poll_interval: Duration::from_millis(250),
        }
    }

    /// How often an idle long-poll re-reads the table.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Messages stored in the queue, leased or not.
    pub async fn depth(&self) -> Result<usize, QueueError> {
        Ok(MessageRepository::count().await?)
    }

    /// Messages currently leased to a consumer.
    pub async fn in_flight(&self) -> Result<usize, QueueError> {
        Ok(MessageRepository::count_in_flight(now_ms()).await?)
    }

    /// Delete every message.
    pub async fn purge(&self) -> Result<(), QueueError> {
        Ok(MessageRepository::purge().await?)
    }

    async fn lease_batch(&self, request: PullRequest) -> Result<Vec<QueueMessage>, DbError> {
        let _guard = self.lease_lock.lock().await;

        let now = now_ms();
        let until = now + request.visibility_timeout.as_millis() as i64;
        let candidates = MessageRepository::visible(now, request.max_messages).await?;

        let mut batch = Vec::with_capacity(candidates.len());
        for record in candidates {
            let receipt = Ulid::new().to_string();
            let leased =
                MessageRepository::lease(&record.message_id, record.visible_at_ms, &receipt, until)
                    .await?;
            if let Some(message) = leased.and_then(|r| r.into_message()) {
                batch.push(message);
            }
        }
        Ok(batch)
    }
}

impl Default for SurrealQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueClient for SurrealQueue {
    fn pull(&self, request: PullRequest) -> QueueFuture<'_, Vec<QueueMessage>> {
        Box::pin(async move {
            if request.max_messages == 0 {
                return Ok(Vec::new());
            }

            let deadline = Instant::now() + request.wait;
            loop {
                let published = self.published.notified();

                let batch = self.lease_batch(request).await?;
                if !batch.is_empty() {
                    tracing::debug!(count = batch.len(), "Leased messages");
                    return Ok(batch);
                }

                let now = Instant::now();
                if now >= deadline {
                    return Ok(Vec::new());
                }

                let mut wake_at = (now + self.poll_interval).min(deadline);
                if let Some(next) = MessageRepository::next_visible_at().await? {
                    let until_visible = Duration::from_millis((next - now_ms()).max(0) as u64);
                    wake_at = wake_at.min(now + until_visible);
                }

                tokio::select! {
                    _ = published => {}
                    _ = tokio::time::sleep_until(wake_at) => {}
                }
            }
        })
    }

    fn ack<'a>(&'a self, receipt: &'a ReceiptHandle) -> QueueFuture<'a, ()> {
        Box::pin(async move {
            match MessageRepository::delete_by_receipt(receipt.as_str()).await? {
                Some(_) => Ok(()),
                None => Err(QueueError::StaleReceipt(receipt.to_string())),
            }
        })
    }
}

impl QueuePublisher for SurrealQueue {
    fn publish(&self, body: Vec<u8>) -> QueueFuture<'_, String> {
        Box::pin(async move {
            let body = String::from_utf8(body)
                .map_err(|_| QueueError::Backend("message body is not valid UTF-8".into()))?;

            let message_id = Ulid::new().to_string();
            MessageRepository::insert(&message_id, body, now_ms()).await?;
            self.published.notify_waiters();

            Ok(message_id)
        })
    }
}
