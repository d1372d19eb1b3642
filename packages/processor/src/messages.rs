//! Message types for actor communication.

use order_core::ProcessorState;
use ractor::RpcReplyPort;

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run one poll cycle: pull a batch and process it.
    Poll,
}

/// Messages for the Orchestrator.
#[derive(Debug)]
pub enum OrchestratorMessage {
    /// Get the lifecycle state.
    GetState { reply: RpcReplyPort<ProcessorState> },

    /// Stop pulling and let in-flight messages finish.
    Shutdown,

    /// Periodic tick for the stats report.
    Tick,
}

/// Errors surfaced by the processor runtime.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("failed to spawn actor: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("actor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
