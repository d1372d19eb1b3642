//! SurrealQL definition of the queue table.

use crate::{DbError, get_db};

/// Define the `queue_message` table. Safe to run against an existing table.
pub async fn init_schema() -> Result<(), DbError> {
    get_db()?.query(QUEUE_MESSAGE_SCHEMA).await?.check()?;
    tracing::debug!("queue_message schema defined");
    Ok(())
}

/// Queue message table schema.
///
/// Times are stored as integer milliseconds since the Unix epoch.
const QUEUE_MESSAGE_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS queue_message SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS message_id ON queue_message TYPE string;
DEFINE FIELD IF NOT EXISTS body ON queue_message TYPE string;
DEFINE FIELD IF NOT EXISTS receipt ON queue_message TYPE option<string>;
DEFINE FIELD IF NOT EXISTS visible_at_ms ON queue_message TYPE int;
DEFINE FIELD IF NOT EXISTS enqueued_at_ms ON queue_message TYPE int;
DEFINE FIELD IF NOT EXISTS receive_count ON queue_message TYPE int DEFAULT 0;

-- Lookups for leasing and acknowledgement
DEFINE INDEX IF NOT EXISTS queue_message_id ON queue_message FIELDS message_id UNIQUE;
DEFINE INDEX IF NOT EXISTS queue_message_visible ON queue_message FIELDS visible_at_ms;
DEFINE INDEX IF NOT EXISTS queue_message_receipt ON queue_message FIELDS receipt;
"#;
