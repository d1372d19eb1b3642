//! Worker actor that pulls batches and runs each order through the gate.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use order_core::{
    DecodeError, FailureStage, Order, OrderDecoder, OrderStatus, ProcessorEvent, PullRequest,
    QueueClient, QueueMessage,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::{broadcast, watch};

use crate::gate::{ExecutionTiming, PaymentGate, panic_message};
use crate::messages::WorkerMessage;
use crate::operation::OperationError;
use crate::stats::ProcessorStats;

/// Polling parameters shared by all workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub batch_size: usize,
    pub wait: Duration,
    pub visibility_timeout: Duration,
    /// Pause after a failed pull.
    pub retry_backoff: Duration,
}

impl PollSettings {
    pub fn pull_request(&self) -> PullRequest {
        PullRequest {
            max_messages: self.batch_size,
            wait: self.wait,
            visibility_timeout: self.visibility_timeout,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            wait: Duration::from_secs(20),
            visibility_timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

/// Everything a worker needs to process a message.
pub struct WorkerContext {
    pub queue: Arc<dyn QueueClient>,
    pub decoder: OrderDecoder,
    pub gate: Arc<PaymentGate>,
    pub stats: Arc<ProcessorStats>,
    pub settings: PollSettings,
    pub event_tx: Option<broadcast::Sender<ProcessorEvent>>,
}

impl WorkerContext {
    fn emit(&self, event: ProcessorEvent) {
        tracing::trace!(event = %event.description(), "Processor event");
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }
}

/// What happened to one message.
#[derive(Debug)]
pub enum MessageOutcome {
    /// The operation succeeded; `acked` is false if deleting the message failed.
    Completed {
        order: Order,
        timing: ExecutionTiming,
        acked: bool,
    },
    /// The payload could not be decoded. The message was not acknowledged.
    DecodeFailed(DecodeError),
    /// The operation failed. The message was not acknowledged.
    OperationFailed { order: Order, error: OperationError },
}

impl MessageOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, MessageOutcome::Completed { .. })
    }
}

/// Advance `order` to `next`, logging a transition the lifecycle forbids.
pub fn advance_order(order: &mut Order, next: OrderStatus) {
    if let Err(error) = order.advance(next) {
        tracing::error!(order_id = order.id(), %error, "Unexpected order transition");
    }
}

/// Decode, execute and acknowledge a single message.
///
/// The message is acknowledged only after the gated operation succeeds.
/// Failures leave it leased so the queue redelivers it once the visibility
/// timeout expires.
pub async fn process_message(
    ctx: &WorkerContext,
    worker_id: &str,
    message: QueueMessage,
) -> MessageOutcome {
    ctx.stats.record_received();

    let mut order = match ctx.decoder.decode(&message.body) {
        Ok(order) => order,
        Err(error) => {
            tracing::warn!(
                worker_id,
                message_id = %message.message_id,
                receive_count = message.receive_count,
                %error,
                "Failed to decode order"
            );
            ctx.stats.record_failed();
            ctx.emit(ProcessorEvent::OrderFailed {
                order_id: None,
                message_id: message.message_id,
                worker_id: worker_id.to_string(),
                stage: FailureStage::Decode,
                error: error.to_string(),
                timestamp: Utc::now(),
            });
            return MessageOutcome::DecodeFailed(error);
        }
    };

    tracing::info!(
        worker_id,
        order_id = order.id(),
        customer_id = order.customer_id,
        items = order.item_count(),
        total_value = order.total_value(),
        "Processing order"
    );
    advance_order(&mut order, OrderStatus::Processing);

    match ctx.gate.execute(order.id()).await {
        Ok(timing) => {
            advance_order(&mut order, OrderStatus::Completed);

            let acked = match ctx.queue.ack(&message.receipt).await {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(
                        worker_id,
                        order_id = order.id(),
                        message_id = %message.message_id,
                        %error,
                        "Failed to delete message, it will be redelivered"
                    );
                    ctx.emit(ProcessorEvent::AckFailed {
                        order_id: order.id().to_string(),
                        message_id: message.message_id.clone(),
                        error: error.to_string(),
                        timestamp: Utc::now(),
                    });
                    false
                }
            };

            ctx.stats.record_processed();
            tracing::info!(
                worker_id,
                order_id = order.id(),
                queued_ms = timing.queued.as_millis() as u64,
                ran_ms = timing.ran.as_millis() as u64,
                "Order processed"
            );
            ctx.emit(ProcessorEvent::OrderCompleted {
                order_id: order.id().to_string(),
                message_id: message.message_id,
                worker_id: worker_id.to_string(),
                duration_ms: timing.total().as_millis() as u64,
                timestamp: Utc::now(),
            });

            MessageOutcome::Completed {
                order,
                timing,
                acked,
            }
        }
        Err(error) => {
            advance_order(&mut order, OrderStatus::Failed);
            tracing::warn!(
                worker_id,
                order_id = order.id(),
                message_id = %message.message_id,
                %error,
                "Payment failed, leaving message for redelivery"
            );
            ctx.stats.record_failed();
            ctx.emit(ProcessorEvent::OrderFailed {
                order_id: Some(order.id().to_string()),
                message_id: message.message_id,
                worker_id: worker_id.to_string(),
                stage: FailureStage::Operation,
                error: error.to_string(),
                timestamp: Utc::now(),
            });

            MessageOutcome::OperationFailed { order, error }
        }
    }
}

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID.
    pub worker_id: String,
    pub context: Arc<WorkerContext>,
    shutdown: watch::Receiver<bool>,
    /// Completed poll cycles.
    pub cycles: u64,
}

impl WorkerActorState {
    fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub context: Arc<WorkerContext>,
    pub shutdown: watch::Receiver<bool>,
}

/// Worker actor: one sequential pull loop.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(worker_id = %args.worker_id, "Worker started");

        myself.send_message(WorkerMessage::Poll)?;

        args.context.stats.worker_started();
        args.context.emit(ProcessorEvent::WorkerStarted {
            worker_id: args.worker_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            context: args.context,
            shutdown: args.shutdown,
            cycles: 0,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            worker_id = %state.worker_id,
            cycles = state.cycles,
            "Worker stopped"
        );
        state.context.stats.worker_stopped();
        state.context.emit(ProcessorEvent::WorkerStopped {
            worker_id: state.worker_id.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                if state.is_cancelled() {
                    myself.stop(None);
                    return Ok(());
                }

                let request = state.context.settings.pull_request();
                let pulled = tokio::select! {
                    result = state.context.queue.pull(request) => Some(result),
                    _ = state.shutdown.changed() => None,
                };

                match pulled {
                    None => {
                        myself.stop(None);
                        return Ok(());
                    }
                    Some(Err(error)) => {
                        let backoff = state.context.settings.retry_backoff;
                        tracing::warn!(
                            worker_id = %state.worker_id,
                            %error,
                            backoff_secs = backoff.as_secs(),
                            "Failed to receive messages"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = state.shutdown.changed() => {}
                        }
                    }
                    Some(Ok(messages)) => {
                        if !messages.is_empty() {
                            tracing::debug!(
                                worker_id = %state.worker_id,
                                count = messages.len(),
                                "Received messages"
                            );
                        }

                        let total = messages.len();
                        for (index, message) in messages.into_iter().enumerate() {
                            if state.is_cancelled() {
                                tracing::info!(
                                    worker_id = %state.worker_id,
                                    remaining = total - index,
                                    "Shutdown requested, leaving remaining messages for redelivery"
                                );
                                break;
                            }
                            let message_id = message.message_id.clone();
                            let step = process_message(&state.context, &state.worker_id, message);
                            if let Err(payload) = AssertUnwindSafe(step).catch_unwind().await {
                                tracing::error!(
                                    worker_id = %state.worker_id,
                                    %message_id,
                                    panic = %panic_message(payload.as_ref()),
                                    "Message step panicked, leaving message for redelivery"
                                );
                                state.context.stats.record_failed();
                            }
                        }
                    }
                }

                state.cycles += 1;
                if state.is_cancelled() {
                    myself.stop(None);
                } else {
                    myself.send_message(WorkerMessage::Poll)?;
                }
            }
        }

        Ok(())
    }
}
