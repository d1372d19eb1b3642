use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{async_order, health, intake_stats, processor_stats, sync_order};
use crate::state::AppState;

/// Build the HTTP router for the intake service.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/orders/sync", post(sync_order))
        .route("/orders/async", post(async_order))
        .route("/health", get(health))
        .route("/stats", get(processor_stats))
        .route("/stats/intake", get(intake_stats))
        .with_state(state)
}
