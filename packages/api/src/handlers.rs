//! Intake and observability handlers.

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use order_core::{Envelope, LineItem, Order, OrderStatus, StatsReport};
use processor::advance_order;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::Instant;
use ulid::Ulid;

use crate::error::AppError;
use crate::state::{AppState, IntakeReport, SERVICE_NAME};

/// Order as submitted by a client. The id is optional.
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub customer_id: i64,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Ignored; the intake stamps its own time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderRequest {
    fn parse(body: &[u8]) -> Result<Order, AppError> {
        let request: OrderRequest =
            serde_json::from_slice(body).map_err(|e| AppError::InvalidOrder(e.to_string()))?;

        let order_id = request
            .order_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Ulid::new().to_string());

        let order = Order::with_id(order_id, request.customer_id, request.items);
        order
            .validate()
            .map_err(|e| AppError::InvalidOrder(e.to_string()))?;
        Ok(order)
    }
}

/// Successful intake response.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
    pub message: String,
    /// Seconds spent handling the request.
    pub processing_time: f64,
    pub processing_mode: String,
}

/// `POST /orders/sync` - charge the payment inline.
///
/// Waits for a payment slot, so latency grows with the number of callers
/// queued on the gate.
pub async fn sync_order(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<OrderResponse>, AppError> {
    let started = Instant::now();
    state.intake.record_sync();

    let mut order = OrderRequest::parse(&body).inspect_err(|e| {
        state.intake.record_failure();
        tracing::warn!(error = ?e, "Rejected sync order");
    })?;
    advance_order(&mut order, OrderStatus::Processing);

    if let Err(source) = state.gate.execute(order.id()).await {
        advance_order(&mut order, OrderStatus::Failed);
        state.intake.record_failure();
        tracing::warn!(order_id = order.id(), error = %source, "Sync payment failed");
        return Err(AppError::PaymentFailed {
            order_id: order.id().to_string(),
            source,
        });
    }

    advance_order(&mut order, OrderStatus::Completed);
    state.intake.record_success();

    let processing_time = started.elapsed().as_secs_f64();
    tracing::info!(
        order_id = order.id(),
        seconds = %format!("{:.2}", processing_time),
        "Sync order completed"
    );

    Ok(Json(OrderResponse {
        order_id: order.id().to_string(),
        status: order.status().to_string(),
        message: "Order processed successfully".to_string(),
        processing_time,
        processing_mode: "synchronous".to_string(),
    }))
}

/// `POST /orders/async` - publish the order and return immediately.
pub async fn async_order(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let started = Instant::now();
    state.intake.record_async();

    let order = OrderRequest::parse(&body).inspect_err(|e| {
        state.intake.record_failure();
        tracing::warn!(error = ?e, "Rejected async order");
    })?;

    let payload = Envelope::wrap(&order)
        .and_then(|envelope| envelope.to_bytes())
        .map_err(|source| {
            state.intake.record_failure();
            AppError::Encode {
                order_id: order.id().to_string(),
                source,
            }
        })?;

    let message_id = state.publisher.publish(payload).await.map_err(|source| {
        state.intake.record_failure();
        tracing::error!(order_id = order.id(), error = %source, "Failed to publish order");
        AppError::QueueFailed {
            order_id: order.id().to_string(),
            source,
        }
    })?;

    state.intake.record_success();

    let processing_time = started.elapsed().as_secs_f64();
    tracing::info!(
        order_id = order.id(),
        %message_id,
        seconds = %format!("{:.4}", processing_time),
        "Async order accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(OrderResponse {
            order_id: order.id().to_string(),
            status: "accepted".to_string(),
            message: "Order accepted for processing".to_string(),
            processing_time,
            processing_mode: "asynchronous".to_string(),
        }),
    ))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
    }))
}

/// `GET /stats` - processor counters.
pub async fn processor_stats(State(state): State<AppState>) -> Json<StatsReport> {
    Json(StatsReport::from(&state.processor_stats.snapshot()))
}

/// `GET /stats/intake` - intake counters.
pub async fn intake_stats(State(state): State<AppState>) -> Json<IntakeReport> {
    Json(state.intake.report())
}
