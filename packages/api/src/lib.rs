//! HTTP intake and entry-point wiring for the order service.
//!
//! - `POST /orders/sync` - charge the payment inline through the shared gate
//! - `POST /orders/async` - publish the order to the queue and return 202
//! - `GET /health`, `GET /stats`, `GET /stats/intake`

pub mod config;
mod error;
mod handlers;
mod init;
mod routes;
mod state;

pub use config::{Config, ConfigError, QueueBackend, ServiceMode};
pub use error::AppError;
pub use handlers::{OrderRequest, OrderResponse};
pub use init::{drain, run_service, shutdown_signal};
pub use routes::app_router;
pub use state::{AppState, IntakeReport, IntakeStats, SERVICE_NAME};
