#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use order_core::{
    Envelope, LineItem, Order, OrderDecoder, PullRequest, QueueClient, QueueError, QueueFuture,
    QueueMessage, ReceiptHandle,
};
use processor::{
    FnOperation, GatedOperation, MemoryQueue, OperationError, OperationFuture, PaymentGate,
    PollSettings, PoolSettings, ProcessorStats, WorkerPool,
};
use tokio::time::Instant;

/// Ordered record of what happened, shared by the queue and the operation.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn order_payload(order_id: &str) -> Vec<u8> {
    let order = Order::with_id(order_id, 42, vec![LineItem::new("PROD-1", 2, 9.99)]);
    Envelope::wrap(&order).unwrap().to_bytes().unwrap()
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Memory queue wrapper that records acks and can inject failures.
pub struct RecordingQueue {
    pub inner: MemoryQueue,
    log: Log,
    receipts: Mutex<HashMap<ReceiptHandle, String>>,
    pulls: AtomicUsize,
    failing_pulls: AtomicUsize,
    failing_acks: AtomicUsize,
}

impl RecordingQueue {
    pub fn new(log: Log) -> Self {
        Self {
            inner: MemoryQueue::new(),
            log,
            receipts: Mutex::new(HashMap::new()),
            pulls: AtomicUsize::new(0),
            failing_pulls: AtomicUsize::new(0),
            failing_acks: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_pulls(&self, n: usize) {
        self.failing_pulls.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_acks(&self, n: usize) {
        self.failing_acks.store(n, Ordering::SeqCst);
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl QueueClient for RecordingQueue {
    fn pull(&self, request: PullRequest) -> QueueFuture<'_, Vec<QueueMessage>> {
        Box::pin(async move {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            if Self::take_failure(&self.failing_pulls) {
                return Err(QueueError::Unavailable("injected".into()));
            }

            let batch = self.inner.pull(request).await?;
            let mut receipts = self.receipts.lock().unwrap();
            for message in &batch {
                if let Ok(order) = OrderDecoder::new().decode(&message.body) {
                    receipts.insert(message.receipt.clone(), order.id().to_string());
                }
            }
            Ok(batch)
        })
    }

    fn ack<'a>(&'a self, receipt: &'a ReceiptHandle) -> QueueFuture<'a, ()> {
        Box::pin(async move {
            let order_id = self
                .receipts
                .lock()
                .unwrap()
                .get(receipt)
                .cloned()
                .unwrap_or_default();

            if Self::take_failure(&self.failing_acks) {
                self.log.lock().unwrap().push(format!("ack-failed:{order_id}"));
                return Err(QueueError::Backend("injected".into()));
            }

            self.inner.ack(receipt).await?;
            self.log.lock().unwrap().push(format!("ack:{order_id}"));
            Ok(())
        })
    }
}

/// One execution of the recording payment.
#[derive(Debug, Clone)]
pub struct Interval {
    pub order_id: String,
    pub start: Instant,
    pub end: Instant,
}

pub type Intervals = Arc<Mutex<Vec<Interval>>>;

/// Payment double that records every execution and fails when `fail` says so.
pub fn recording_payment<F>(
    latency: Duration,
    log: Log,
    intervals: Intervals,
    fail: F,
) -> impl GatedOperation
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    let fail = Arc::new(fail);
    FnOperation::new("recording-payment", move |order_id: &str| -> OperationFuture {
        let order_id = order_id.to_string();
        let log = log.clone();
        let intervals = intervals.clone();
        let fail = fail.clone();
        Box::pin(async move {
            let start = Instant::now();
            tokio::time::sleep(latency).await;
            let end = Instant::now();
            intervals.lock().unwrap().push(Interval {
                order_id: order_id.clone(),
                start,
                end,
            });

            if fail(&order_id) {
                log.lock().unwrap().push(format!("declined:{order_id}"));
                Err(OperationError::declined(order_id, "test"))
            } else {
                log.lock().unwrap().push(format!("paid:{order_id}"));
                Ok(())
            }
        })
    })
}

pub fn assert_no_overlap(intervals: &Intervals) {
    let mut intervals = intervals.lock().unwrap().clone();
    intervals.sort_by_key(|i| i.start);
    for pair in intervals.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "{} overlaps {}",
            pair[0].order_id,
            pair[1].order_id
        );
    }
}

pub struct Harness {
    pub queue: Arc<RecordingQueue>,
    pub gate: Arc<PaymentGate>,
    pub stats: Arc<ProcessorStats>,
    pub log: Log,
    pub intervals: Intervals,
}

impl Harness {
    pub fn new<F>(capacity: usize, latency: Duration, fail: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let log: Log = Arc::default();
        let intervals: Intervals = Arc::default();
        let operation = recording_payment(latency, log.clone(), intervals.clone(), fail);
        Self {
            queue: Arc::new(RecordingQueue::new(log.clone())),
            gate: Arc::new(PaymentGate::new(capacity, operation)),
            stats: Arc::new(ProcessorStats::new()),
            log,
            intervals,
        }
    }

    /// Harness whose gate runs `operation` instead of the recording payment.
    pub fn with_operation(capacity: usize, operation: impl GatedOperation) -> Self {
        let log: Log = Arc::default();
        Self {
            queue: Arc::new(RecordingQueue::new(log.clone())),
            gate: Arc::new(PaymentGate::new(capacity, operation)),
            stats: Arc::new(ProcessorStats::new()),
            log,
            intervals: Arc::default(),
        }
    }

    pub fn pool(&self, workers: usize, poll: PollSettings) -> WorkerPool {
        WorkerPool::new(
            PoolSettings { workers, poll },
            self.queue.clone(),
            self.gate.clone(),
            self.stats.clone(),
        )
    }

    pub fn publish(&self, order_id: &str) {
        self.queue.inner.push(order_payload(order_id));
    }
}

/// Poll `condition` every 50ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
