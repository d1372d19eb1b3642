#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use api::{AppState, app_router};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use order_core::{QueueError, QueueFuture, QueuePublisher};
use processor::{MemoryQueue, PaymentGate, ProcessorStats, SimulatedPayment};
use serde_json::Value;
use tower::ServiceExt;

/// Publisher that is always down.
pub struct UnavailablePublisher;

impl QueuePublisher for UnavailablePublisher {
    fn publish(&self, _body: Vec<u8>) -> QueueFuture<'_, String> {
        Box::pin(async { Err(QueueError::Unavailable("broker offline".into())) })
    }
}

pub struct TestApp {
    pub router: Router,
    pub queue: Arc<MemoryQueue>,
    pub gate: Arc<PaymentGate>,
    pub stats: Arc<ProcessorStats>,
}

impl TestApp {
    /// App backed by a memory queue and a payment that declines ids starting with `fail`.
    pub fn new(capacity: usize, latency: Duration) -> Self {
        let queue = Arc::new(MemoryQueue::new());
        let payment = SimulatedPayment::new(latency).with_failure_hook(|id| id.starts_with("fail"));
        let gate = Arc::new(PaymentGate::new(capacity, payment));
        let stats = Arc::new(ProcessorStats::new());

        let state = AppState::new(gate.clone(), queue.clone(), stats.clone());
        Self {
            router: app_router(state),
            queue,
            gate,
            stats,
        }
    }

    pub fn with_publisher(publisher: Arc<dyn QueuePublisher>) -> Self {
        let mut app = Self::new(1, Duration::ZERO);
        let state = AppState::new(app.gate.clone(), publisher, app.stats.clone());
        app.router = app_router(state);
        app
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        send(self.router.clone(), request).await
    }

    pub async fn post(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        send(self.router.clone(), request).await
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn order_json(order_id: &str) -> String {
    serde_json::json!({
        "order_id": order_id,
        "customer_id": 7,
        "items": [
            { "product_id": "PROD-1", "quantity": 2, "price": 19.99 },
            { "product_id": "PROD-2", "quantity": 1, "price": 5.0 }
        ]
    })
    .to_string()
}
