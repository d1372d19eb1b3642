//! Queue-driven order processing engine.
//!
//! This crate provides the Ractor-based runtime that pulls order messages
//! from a queue, pushes them through a bounded payment gate and
//! acknowledges them only after the payment succeeds.
//!
//! # Architecture
//!
//! - `Orchestrator` - Top-level actor that owns the pool and reports stats
//! - `WorkerActor` - One sequential pull/process loop
//! - `PaymentGate` - Bounds concurrent executions of the payment operation
//! - `ProcessorStats` - Lock-free counters shared by all workers
//!
//! # Usage
//!
//! ```ignore
//! use processor::{start_processor, OrchestratorSettings, PaymentGate, PoolSettings,
//!     ProcessorStats, SimulatedPayment, WorkerPool};
//!
//! let gate = Arc::new(PaymentGate::new(1, SimulatedPayment::default()));
//! let stats = Arc::new(ProcessorStats::new());
//! let pool = WorkerPool::new(PoolSettings::default(), queue, gate, stats);
//! let processor = start_processor(pool, OrchestratorSettings::default()).await?;
//!
//! // later
//! processor.shutdown_and_wait().await?;
//! ```

mod gate;
mod memory_queue;
mod messages;
mod operation;
mod orchestrator;
mod pool;
mod stats;
mod worker_actor;

pub use gate::{ExecutionTiming, PaymentGate};
pub use memory_queue::{DeadLetter, MemoryQueue};
pub use messages::{OrchestratorMessage, ProcessorError, WorkerMessage};
pub use operation::{
    FailureHook, FnOperation, GatedOperation, OperationError, OperationFuture, SimulatedPayment,
};
pub use orchestrator::{
    Orchestrator, OrchestratorArgs, OrchestratorSettings, ProcessorHandle, start_processor,
};
pub use pool::{PoolSettings, WorkerHandle, WorkerPool};
pub use stats::ProcessorStats;
pub use worker_actor::{
    MessageOutcome, PollSettings, WorkerActor, WorkerArgs, WorkerContext, advance_order,
    process_message,
};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
