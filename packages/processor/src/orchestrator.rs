//! Orchestrator actor: owns the worker pool, the periodic stats report and
//! graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use order_core::{ProcessorEvent, ProcessorState, StatsSnapshot};
use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::messages::{OrchestratorMessage, ProcessorError};
use crate::pool::WorkerPool;

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Period of the stats report, at least one millisecond.
    pub report_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(30),
        }
    }
}

/// Orchestrator actor arguments.
pub struct OrchestratorArgs {
    pub pool: Arc<WorkerPool>,
    pub settings: OrchestratorSettings,
}

/// State for the orchestrator actor.
pub struct OrchestratorState {
    pub pool: Arc<WorkerPool>,
    pub lifecycle: ProcessorState,
    /// Workers that have not terminated yet.
    pub live_workers: usize,
}

impl OrchestratorState {
    /// A pool stopped from outside the orchestrator is draining too.
    fn observe_pool(&mut self) {
        if self.lifecycle == ProcessorState::Running && self.pool.is_stopping() {
            tracing::info!(
                live_workers = self.live_workers,
                "Worker pool stopped, draining order processor"
            );
            self.lifecycle = ProcessorState::Draining;
        }
    }

    fn finish(&mut self, myself: &ActorRef<OrchestratorMessage>) {
        self.lifecycle = ProcessorState::Stopped;
        myself.stop(None);
    }
}

fn log_report(label: &str, snapshot: &StatsSnapshot) {
    tracing::info!(
        received = snapshot.received,
        processed = snapshot.processed,
        failed = snapshot.failed,
        active_workers = snapshot.active_workers,
        uptime_secs = snapshot.uptime.as_secs(),
        success_rate = %format!("{:.1}%", snapshot.success_rate_percent()),
        rate_per_sec = %format!("{:.2}", snapshot.throughput_per_sec()),
        "{}",
        label
    );
}

/// Orchestrator actor that supervises the workers.
pub struct Orchestrator;

impl Actor for Orchestrator {
    type Msg = OrchestratorMessage;
    type State = OrchestratorState;
    type Arguments = OrchestratorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            workers = args.pool.size(),
            payment_capacity = args.pool.gate().capacity(),
            "Starting order processor"
        );

        let workers = args
            .pool
            .spawn_workers(Some(myself.get_cell()))
            .await
            .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn workers: {}", e)))?;

        // Start periodic stats report
        let period = args.settings.report_interval.max(Duration::from_millis(1));
        let myself_clone = myself.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if myself_clone.send_message(OrchestratorMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(OrchestratorState {
            pool: args.pool,
            lifecycle: ProcessorState::Running,
            live_workers: workers.len(),
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if state.live_workers == 0 {
            tracing::warn!("Processor started without workers");
            if state.pool.is_stopping() {
                state.finish(&myself);
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.lifecycle = ProcessorState::Stopped;
        log_report("Final processor stats", &state.pool.stats().snapshot());
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            OrchestratorMessage::GetState { reply } => {
                state.observe_pool();
                let _ = reply.send(state.lifecycle);
            }

            OrchestratorMessage::Shutdown => {
                if state.lifecycle.is_accepting_work() {
                    tracing::info!(
                        live_workers = state.live_workers,
                        "Draining order processor"
                    );
                    state.lifecycle = ProcessorState::Draining;
                    state.pool.stop();
                }
                if state.live_workers == 0 {
                    state.finish(&myself);
                }
            }

            OrchestratorMessage::Tick => {
                log_report("Processor stats", &state.pool.stats().snapshot());
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                tracing::debug!(
                    "Worker actor {} terminated: {:?}",
                    cell.get_id(),
                    reason
                );
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                tracing::error!("Worker actor {} failed: {}", cell.get_id(), error);
                // post_stop does not run for a failed actor.
                state.pool.stats().worker_stopped();
            }
            _ => return Ok(()),
        }

        state.observe_pool();
        state.live_workers = state.live_workers.saturating_sub(1);
        if state.live_workers == 0 {
            if state.lifecycle == ProcessorState::Running {
                tracing::warn!("All workers exited while running");
                state.pool.stop();
                state.lifecycle = ProcessorState::Draining;
            }
            tracing::info!("All workers stopped");
            state.finish(&myself);
        }
        Ok(())
    }
}

/// Handle to a running processor.
pub struct ProcessorHandle {
    actor: ActorRef<OrchestratorMessage>,
    join: JoinHandle<()>,
    pool: Arc<WorkerPool>,
}

impl ProcessorHandle {
    /// Current lifecycle state. A processor whose actor is gone is `Stopped`.
    pub async fn state(&self) -> ProcessorState {
        let (tx, rx) = ractor::concurrency::oneshot();
        if self
            .actor
            .send_message(OrchestratorMessage::GetState { reply: tx.into() })
            .is_err()
        {
            return ProcessorState::Stopped;
        }
        rx.await.unwrap_or(ProcessorState::Stopped)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.pool.stats().snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProcessorEvent> {
        self.pool.subscribe()
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Begin a graceful shutdown. Returns immediately.
    pub fn shutdown(&self) {
        if self.actor.send_message(OrchestratorMessage::Shutdown).is_err() {
            self.pool.stop();
        }
    }

    /// Wait until every worker has exited and the orchestrator has stopped.
    pub async fn wait(self) -> Result<(), ProcessorError> {
        self.join.await?;
        Ok(())
    }

    pub async fn shutdown_and_wait(self) -> Result<(), ProcessorError> {
        self.shutdown();
        self.wait().await
    }
}

/// Start the orchestrator and its workers.
pub async fn start_processor(
    pool: WorkerPool,
    settings: OrchestratorSettings,
) -> Result<ProcessorHandle, ProcessorError> {
    let pool = Arc::new(pool);
    let (actor, join) = Actor::spawn(
        None,
        Orchestrator,
        OrchestratorArgs {
            pool: pool.clone(),
            settings,
        },
    )
    .await?;

    Ok(ProcessorHandle { actor, join, pool })
}
