//! Message repository for the durable queue.

use chrono::{DateTime, Utc};
use order_core::{QueueMessage, ReceiptHandle};
use serde::{Deserialize, Serialize};

use crate::{DbError, get_db};

/// Repository for queue message persistence operations.
pub struct MessageRepository;

/// Stored form of a queued message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub body: String,
    pub receipt: Option<String>,
    pub visible_at_ms: i64,
    pub enqueued_at_ms: i64,
    pub receive_count: u32,
}

impl MessageRecord {
    /// Convert a leased record into the message handed to consumers.
    pub fn into_message(self) -> Option<QueueMessage> {
        let receipt = ReceiptHandle::new(self.receipt?);
        Some(QueueMessage {
            message_id: self.message_id,
            body: self.body.into_bytes(),
            receipt,
            enqueued_at: DateTime::<Utc>::from_timestamp_millis(self.enqueued_at_ms)
                .unwrap_or_default(),
            receive_count: self.receive_count,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

impl MessageRepository {
    /// Insert a new, immediately visible message.
    pub async fn insert(
        message_id: &str,
        body: String,
        now_ms: i64,
    ) -> Result<MessageRecord, DbError> {
        let db = get_db()?;

        let record = MessageRecord {
            message_id: message_id.to_string(),
            body,
            receipt: None,
            visible_at_ms: now_ms,
            enqueued_at_ms: now_ms,
            receive_count: 0,
        };

        let created: Option<MessageRecord> = db
            .create(("queue_message", message_id.to_string()))
            .content(record)
            .await?;

        created.ok_or_else(|| DbError::Query("Failed to insert message".into()))
    }

    /// Oldest messages visible at `now_ms`.
    pub async fn visible(now_ms: i64, limit: usize) -> Result<Vec<MessageRecord>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                "SELECT * FROM queue_message WHERE visible_at_ms <= $now \
                 ORDER BY enqueued_at_ms ASC, message_id ASC LIMIT $limit",
            )
            .bind(("now", now_ms))
            .bind(("limit", limit as i64))
            .await?;

        Ok(result.take(0)?)
    }

    /// Lease one message under a fresh receipt until `visible_at_ms`.
    ///
    /// Returns `None` if the message was deleted or leased by someone else
    /// since it was read.
    pub async fn lease(
        message_id: &str,
        seen_visible_at_ms: i64,
        receipt: &str,
        visible_at_ms: i64,
    ) -> Result<Option<MessageRecord>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                "UPDATE type::thing('queue_message', $id) \
                 SET receipt = $receipt, visible_at_ms = $until, receive_count += 1 \
                 WHERE visible_at_ms = $seen RETURN AFTER",
            )
            .bind(("id", message_id.to_string()))
            .bind(("receipt", receipt.to_string()))
            .bind(("until", visible_at_ms))
            .bind(("seen", seen_visible_at_ms))
            .await?;

        let records: Vec<MessageRecord> = result.take(0)?;
        Ok(records.into_iter().next())
    }

    /// Delete the message currently leased under `receipt`.
    ///
    /// Returns the deleted record, or `None` if no message holds that receipt.
    pub async fn delete_by_receipt(receipt: &str) -> Result<Option<MessageRecord>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("DELETE queue_message WHERE receipt = $receipt RETURN BEFORE")
            .bind(("receipt", receipt.to_string()))
            .await?;

        let records: Vec<MessageRecord> = result.take(0)?;
        Ok(records.into_iter().next())
    }

    /// Earliest time any stored message becomes visible.
    pub async fn next_visible_at() -> Result<Option<i64>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT * FROM queue_message ORDER BY visible_at_ms ASC LIMIT 1")
            .await?;

        let records: Vec<MessageRecord> = result.take(0)?;
        Ok(records.into_iter().next().map(|r| r.visible_at_ms))
    }

    /// Number of stored messages, leased or not.
    pub async fn count() -> Result<usize, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT count() FROM queue_message GROUP ALL")
            .await?;

        let row: Option<CountRow> = result.take(0)?;
        Ok(row.map_or(0, |r| r.count))
    }

    /// Number of messages currently leased.
    pub async fn count_in_flight(now_ms: i64) -> Result<usize, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT count() FROM queue_message WHERE visible_at_ms > $now GROUP ALL")
            .bind(("now", now_ms))
            .await?;

        let row: Option<CountRow> = result.take(0)?;
        Ok(row.map_or(0, |r| r.count))
    }

    /// Delete every message.
    pub async fn purge() -> Result<(), DbError> {
        let db = get_db()?;
        db.query("DELETE queue_message").await?.check()?;
        Ok(())
    }
}
