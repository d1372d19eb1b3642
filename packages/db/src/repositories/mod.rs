//! Repository implementations for database operations.

mod message_repo;

pub use message_repo::{MessageRecord, MessageRepository};
