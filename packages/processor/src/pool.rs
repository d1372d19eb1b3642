//! Fixed-size set of workers sharing one queue, one gate and one stats block.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::join_all;
use order_core::{OrderDecoder, ProcessorEvent, QueueClient};
use ractor::{Actor, ActorCell, ActorRef};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::gate::PaymentGate;
use crate::messages::{ProcessorError, WorkerMessage};
use crate::stats::ProcessorStats;
use crate::worker_actor::{PollSettings, WorkerActor, WorkerArgs, WorkerContext};

/// Pool size and polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub workers: usize,
    pub poll: PollSettings,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            poll: PollSettings::default(),
        }
    }
}

/// A running worker.
pub type WorkerHandle = (ActorRef<WorkerMessage>, JoinHandle<()>);

/// Owns the shared dependencies and the shutdown signal of a worker pool.
pub struct WorkerPool {
    workers: usize,
    context: Arc<WorkerContext>,
    shutdown_tx: watch::Sender<bool>,
    worker_counter: AtomicU64,
}

impl WorkerPool {
    pub fn new(
        settings: PoolSettings,
        queue: Arc<dyn QueueClient>,
        gate: Arc<PaymentGate>,
        stats: Arc<ProcessorStats>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            workers: settings.workers,
            context: Arc::new(WorkerContext {
                queue,
                decoder: OrderDecoder::new(),
                gate,
                stats,
                settings: settings.poll,
                event_tx: Some(event_tx),
            }),
            shutdown_tx,
            worker_counter: AtomicU64::new(0),
        }
    }

    pub fn size(&self) -> usize {
        self.workers
    }

    pub fn stats(&self) -> &Arc<ProcessorStats> {
        &self.context.stats
    }

    pub fn gate(&self) -> &Arc<PaymentGate> {
        &self.context.gate
    }

    /// Subscribe to processor events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessorEvent> {
        match self.context.event_tx {
            Some(ref tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Ask every worker to finish its current message and exit.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_stopping(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    fn next_worker_id(&self) -> String {
        let n = self.worker_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("worker-{}", n)
    }

    /// Spawn the configured number of workers, linked to `supervisor` if given.
    ///
    /// On a spawn failure the pool is stopped so already running workers exit.
    pub async fn spawn_workers(
        &self,
        supervisor: Option<ActorCell>,
    ) -> Result<Vec<WorkerHandle>, ProcessorError> {
        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let args = WorkerArgs {
                worker_id: self.next_worker_id(),
                context: self.context.clone(),
                shutdown: self.shutdown_tx.subscribe(),
            };

            let spawned = match supervisor {
                Some(ref cell) => Actor::spawn_linked(None, WorkerActor, args, cell.clone()).await,
                None => Actor::spawn(None, WorkerActor, args).await,
            };

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::error!("Failed to spawn worker: {}", e);
                    self.stop();
                    return Err(e.into());
                }
            }
        }
        Ok(handles)
    }

    /// Spawn the workers and wait until all of them have exited.
    pub async fn run(&self) -> Result<(), ProcessorError> {
        let workers = self.spawn_workers(None).await?;
        tracing::info!(workers = workers.len(), "Worker pool running");

        for result in join_all(workers.into_iter().map(|(_, handle)| handle)).await {
            result?;
        }

        tracing::info!("Worker pool drained");
        Ok(())
    }
}
