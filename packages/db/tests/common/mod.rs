use std::sync::LazyLock;

use tokio::sync::{Mutex, MutexGuard};

use db::{DbConfig, DbError};

/// The database handle is global, so scenarios must not interleave.
static QUEUE_TABLE: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Open the in-memory database and empty the queue table.
pub async fn fresh_queue_table() -> Result<MutexGuard<'static, ()>, DbError> {
    let guard = QUEUE_TABLE.lock().await;
    db::init(DbConfig::memory()).await?;
    db::get_db()?.query("DELETE queue_message;").await?.check()?;
    Ok(guard)
}
