//! SurrealDB-backed durable queue for the order processor.
//!
//! Messages live in the `queue_message` table. [`SurrealQueue`] implements
//! the processor's queue traits on top of [`repositories::MessageRepository`].
//!
//! # Features
//!
//! - `memory` (default): `mem://` endpoints
//! - `rocksdb`: `rocksdb://<path>` endpoints for a queue that survives restarts

mod connection;
mod queue;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, get_db, init_db};
pub use queue::SurrealQueue;
pub use schema::init_schema;

/// Connect and define the queue table. Call once at startup.
pub async fn init(config: DbConfig) -> Result<(), DbError> {
    init_db(config).await?;
    init_schema().await?;
    Ok(())
}
