//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use order_core::QueueError;
use processor::OperationError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<String>,
}

/// Errors returned by the intake handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid order format")]
    InvalidOrder(String),

    #[error("Failed to encode order")]
    Encode {
        order_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Payment processing failed")]
    PaymentFailed {
        order_id: String,
        #[source]
        source: OperationError,
    },

    #[error("Failed to queue order")]
    QueueFailed {
        order_id: String,
        #[source]
        source: QueueError,
    },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidOrder(_) => StatusCode::BAD_REQUEST,
            AppError::Encode { .. }
            | AppError::PaymentFailed { .. }
            | AppError::QueueFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            AppError::InvalidOrder(_) => None,
            AppError::Encode { order_id, .. }
            | AppError::PaymentFailed { order_id, .. }
            | AppError::QueueFailed { order_id, .. } => Some(order_id),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            order_id: self.order_id().map(str::to_string),
        };

        (self.status(), Json(body)).into_response()
    }
}
