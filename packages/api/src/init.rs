//! Service wiring: queue, gate, processor and HTTP intake.

use std::sync::Arc;

use db::{DbConfig, SurrealQueue};
use order_core::{QueueClient, QueuePublisher};
use processor::{
    MemoryQueue, PaymentGate, ProcessorHandle, ProcessorStats, SimulatedPayment, WorkerPool,
    start_processor,
};

use crate::config::{Config, QueueBackend};
use crate::routes::app_router;
use crate::state::AppState;

type QueuePair = (Arc<dyn QueueClient>, Arc<dyn QueuePublisher>);

async fn open_queue(backend: &QueueBackend) -> anyhow::Result<QueuePair> {
    match backend {
        QueueBackend::Memory => {
            tracing::info!("Using in-process memory queue");
            let queue = Arc::new(MemoryQueue::new());
            let client: Arc<dyn QueueClient> = queue.clone();
            let publisher: Arc<dyn QueuePublisher> = queue;
            Ok((client, publisher))
        }
        QueueBackend::Surreal(endpoint) => {
            db::init(DbConfig::endpoint(endpoint.clone())).await?;
            let queue = Arc::new(SurrealQueue::new());
            let client: Arc<dyn QueueClient> = queue.clone();
            let publisher: Arc<dyn QueuePublisher> = queue;
            Ok((client, publisher))
        }
    }
}

/// Resolves when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Run the service until Ctrl-C, then drain the processor.
pub async fn run_service(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        mode = %config.mode,
        workers = config.workers,
        payment_capacity = config.payment_capacity,
        "Initializing order service..."
    );

    let (client, publisher) = open_queue(&config.queue).await?;

    let gate = Arc::new(PaymentGate::new(
        config.payment_capacity,
        SimulatedPayment::new(config.payment_latency),
    ));
    let stats = Arc::new(ProcessorStats::new());

    let processor = if config.mode.runs_processor() {
        let pool = WorkerPool::new(config.pool_settings(), client, gate.clone(), stats.clone());
        Some(start_processor(pool, config.orchestrator_settings()).await?)
    } else {
        None
    };

    if config.mode.serves_http() {
        let state = AppState::new(gate.clone(), publisher, stats);
        let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
        tracing::info!("listening on http://{}", listener.local_addr()?);

        axum::serve(listener, app_router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        shutdown_signal().await;
    }

    drain(processor, &gate).await?;

    tracing::info!("Order service stopped");
    Ok(())
}

/// Let the processor finish its in-flight messages, then close the payment
/// gate so nothing else can start a payment.
pub async fn drain(processor: Option<ProcessorHandle>, gate: &PaymentGate) -> anyhow::Result<()> {
    if let Some(processor) = processor {
        tracing::info!("Draining processor...");
        processor.shutdown_and_wait().await?;
    }

    gate.close();
    tracing::info!(in_use = gate.in_use(), "Payment gate closed");
    Ok(())
}
