//! The downstream operation guarded by the payment gate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Errors returned by a gated operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("payment declined for order {order_id}: {reason}")]
    Declined { order_id: String, reason: String },

    #[error("payment for order {order_id} panicked: {message}")]
    Panicked { order_id: String, message: String },

    #[error("payment gate is closed")]
    GateClosed,
}

impl OperationError {
    pub fn declined(order_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Declined {
            order_id: order_id.into(),
            reason: reason.into(),
        }
    }
}

/// Future type for async operations.
pub type OperationFuture = Pin<Box<dyn Future<Output = Result<(), OperationError>> + Send>>;

/// An operation on the bottleneck resource.
///
/// Implement this trait to plug a real payment provider (or a test double)
/// behind the [`PaymentGate`](crate::PaymentGate).
pub trait GatedOperation: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run the operation for one order.
    fn run(&self, order_id: &str) -> OperationFuture;
}

/// Decides whether the simulated payment for an order should fail.
pub type FailureHook = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Fixed-latency payment simulation with an optional failure hook.
#[derive(Clone)]
pub struct SimulatedPayment {
    latency: Duration,
    fail_when: Option<FailureHook>,
}

impl SimulatedPayment {
    /// Create a simulation that always succeeds after `latency`.
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            fail_when: None,
        }
    }

    /// Decline payments for which `hook` returns true.
    pub fn with_failure_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Arc::new(hook));
        self
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl Default for SimulatedPayment {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl std::fmt::Debug for SimulatedPayment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedPayment")
            .field("latency", &self.latency)
            .field("fail_when", &self.fail_when.is_some())
            .finish()
    }
}

impl GatedOperation for SimulatedPayment {
    fn name(&self) -> &str {
        "simulated-payment"
    }

    fn run(&self, order_id: &str) -> OperationFuture {
        let latency = self.latency;
        let order_id = order_id.to_string();
        let fail = self.fail_when.as_ref().is_some_and(|hook| hook(&order_id));

        Box::pin(async move {
            tokio::time::sleep(latency).await;
            if fail {
                Err(OperationError::declined(order_id, "injected failure"))
            } else {
                Ok(())
            }
        })
    }
}

/// A simple function-based operation.
pub struct FnOperation<F>
where
    F: Fn(&str) -> OperationFuture + Send + Sync + 'static,
{
    name: String,
    operation: F,
}

impl<F> FnOperation<F>
where
    F: Fn(&str) -> OperationFuture + Send + Sync + 'static,
{
    /// Create a new function-based operation.
    pub fn new(name: impl Into<String>, operation: F) -> Self {
        Self {
            name: name.into(),
            operation,
        }
    }
}

impl<F> GatedOperation for FnOperation<F>
where
    F: Fn(&str) -> OperationFuture + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, order_id: &str) -> OperationFuture {
        (self.operation)(order_id)
    }
}
