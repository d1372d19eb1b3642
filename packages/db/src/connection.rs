//! Process-wide SurrealDB handle for the durable queue.

use std::sync::LazyLock;

use order_core::QueueError;
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use thiserror::Error;
use tokio::sync::OnceCell;

static DB: LazyLock<OnceCell<Surreal<Any>>> = LazyLock::new(OnceCell::new);

pub type Database = Surreal<Any>;

const NAMESPACE: &str = "orders";
const DATABASE: &str = "queue";

/// Where the queue table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// `mem://` or `rocksdb://<path>`.
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
}

impl DbConfig {
    /// In-process storage, lost on exit.
    pub fn memory() -> Self {
        Self::endpoint("mem://")
    }

    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: NAMESPACE.to_string(),
            database: DATABASE.to_string(),
        }
    }

    /// Check the endpoint against the storage engines compiled into this build.
    pub fn validate(&self) -> Result<(), DbError> {
        let (scheme, rest) = self
            .endpoint
            .split_once("://")
            .ok_or_else(|| DbError::UnsupportedEndpoint(self.endpoint.clone()))?;

        match scheme {
            "mem" => Ok(()),
            "rocksdb" if cfg!(feature = "rocksdb") && !rest.is_empty() => Ok(()),
            _ => Err(DbError::UnsupportedEndpoint(self.endpoint.clone())),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::memory()
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("queue database is not initialized")]
    NotInitialized,
    #[error("unsupported queue endpoint '{0}'")]
    UnsupportedEndpoint(String),
    #[error("database error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("query error: {0}")]
    Query(String),
}

impl From<DbError> for QueueError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotInitialized | DbError::Connection(_) => Self::Unavailable(err.to_string()),
            DbError::UnsupportedEndpoint(_) | DbError::Query(_) => Self::Backend(err.to_string()),
        }
    }
}

/// Open the queue database. The first successful call wins; later calls
/// return the existing handle whatever their config.
pub async fn init_db(config: DbConfig) -> Result<&'static Database, DbError> {
    config.validate()?;

    DB.get_or_try_init(|| async {
        let db = connect(config.endpoint.as_str()).await?;
        db.use_ns(&config.namespace).use_db(&config.database).await?;

        tracing::info!(
            endpoint = %config.endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Queue database ready"
        );
        Ok(db)
    })
    .await
}

pub fn get_db() -> Result<&'static Database, DbError> {
    DB.get().ok_or(DbError::NotInitialized)
}
