#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use common::{Harness, assert_no_overlap, entries, order_payload, wait_until};
use order_core::{OrderDecoder, OrderStatus, ProcessorEvent, QueueClient};
use processor::{
    FnOperation, MessageOutcome, OperationFuture, PaymentGate, PollSettings, WorkerContext,
    process_message,
};
use tokio::time::Instant;

fn poll() -> PollSettings {
    PollSettings {
        batch_size: 10,
        wait: Duration::from_secs(20),
        visibility_timeout: Duration::from_secs(30),
        retry_backoff: Duration::from_secs(5),
    }
}

#[tokio::test(start_paused = true)]
async fn gate_never_exceeds_capacity() -> Result<(), Box<dyn Error>> {
    for capacity in [1usize, 2, 3] {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (c, p) = (current.clone(), peak.clone());
        let gate = Arc::new(PaymentGate::new(
            capacity,
            FnOperation::new("counting", move |_: &str| -> OperationFuture {
                let (c, p) = (c.clone(), p.clone());
                Box::pin(async move {
                    let now = c.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    c.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            }),
        ));

        let started = Instant::now();
        let mut tasks = Vec::new();
        for i in 0..6 {
            let gate = gate.clone();
            tasks.push(tokio::spawn(
                async move { gate.execute(&format!("o-{i}")).await },
            ));
        }
        for task in tasks {
            task.await??;
        }

        assert_eq!(peak.load(Ordering::SeqCst), capacity);
        assert_eq!(
            started.elapsed(),
            Duration::from_millis(500) * 6usize.div_ceil(capacity) as u32
        );
        assert_eq!(gate.available_slots(), capacity);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn drains_ten_orders_through_single_slot_gate() -> Result<(), Box<dyn Error>> {
    let harness = Harness::new(1, Duration::from_secs(3), |_| false);
    for i in 0..10 {
        harness.publish(&format!("order-{i}"));
    }

    let pool = Arc::new(harness.pool(5, poll()));
    let started = Instant::now();
    let runner = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let stats = harness.stats.clone();
    assert!(wait_until(Duration::from_secs(60), || stats.snapshot().processed == 10).await);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(30), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(31), "{elapsed:?}");

    let snapshot = harness.stats.snapshot();
    assert_eq!(snapshot.received, 10);
    assert_eq!(snapshot.failed, 0);
    assert_eq!(harness.queue.inner.depth(), 0);
    assert_eq!(harness.queue.inner.acked(), 10);
    assert_no_overlap(&harness.intervals);

    pool.stop();
    runner.await??;
    assert_eq!(harness.stats.snapshot().active_workers, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn ack_follows_successful_payment() -> Result<(), Box<dyn Error>> {
    let harness = Harness::new(2, Duration::from_millis(200), |_| false);
    for i in 0..6 {
        harness.publish(&format!("order-{i}"));
    }

    let pool = Arc::new(harness.pool(3, PollSettings { batch_size: 2, ..poll() }));
    let runner = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let stats = harness.stats.clone();
    assert!(wait_until(Duration::from_secs(30), || stats.snapshot().processed == 6).await);
    pool.stop();
    runner.await??;

    let log = entries(&harness.log);
    for i in 0..6 {
        let paid = format!("paid:order-{i}");
        let ack = format!("ack:order-{i}");
        let paid_at = log.iter().position(|e| *e == paid).expect("payment recorded");
        let ack_at = log.iter().position(|e| *e == ack).expect("ack recorded");
        assert!(paid_at < ack_at, "{log:?}");
        assert_eq!(log.iter().filter(|e| **e == ack).count(), 1);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn undecodable_message_is_counted_and_left_unacked() -> Result<(), Box<dyn Error>> {
    let harness = Harness::new(1, Duration::from_millis(10), |_| false);
    harness.queue.inner.push(b"definitely not json".to_vec());

    let pool = Arc::new(harness.pool(1, poll()));
    let runner = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let stats = harness.stats.clone();
    assert!(wait_until(Duration::from_secs(5), || stats.snapshot().received == 1).await);
    pool.stop();
    runner.await??;

    let snapshot = harness.stats.snapshot();
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.processed, 0);
    assert_eq!(harness.queue.inner.acked(), 0);
    assert_eq!(harness.queue.inner.in_flight(), 1);
    assert!(harness.intervals.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn one_bad_message_does_not_poison_the_batch() -> Result<(), Box<dyn Error>> {
    let harness = Harness::new(1, Duration::from_millis(100), |_| false);
    for i in 0..4 {
        harness.publish(&format!("order-{i}"));
    }
    harness.queue.inner.push(br#"{"Message": "{broken"}"#.to_vec());
    for i in 4..9 {
        harness.publish(&format!("order-{i}"));
    }

    let pool = Arc::new(harness.pool(1, poll()));
    let runner = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let stats = harness.stats.clone();
    assert!(wait_until(Duration::from_secs(10), || stats.snapshot().received == 10).await);
    pool.stop();
    runner.await??;

    let snapshot = harness.stats.snapshot();
    assert_eq!(snapshot.processed, 9);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(harness.queue.inner.acked(), 9);
    assert_eq!(harness.queue.inner.depth(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_payment_is_redelivered_after_visibility_timeout() -> Result<(), Box<dyn Error>> {
    let declined_once = Arc::new(AtomicBool::new(false));
    let flag = declined_once.clone();
    let harness = Harness::new(1, Duration::from_millis(100), move |_| {
        !flag.swap(true, Ordering::SeqCst)
    });
    harness.publish("order-flaky");

    let pool = Arc::new(harness.pool(1, poll()));
    let started = Instant::now();
    let runner = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let stats = harness.stats.clone();
    assert!(wait_until(Duration::from_secs(90), || stats.snapshot().processed == 1).await);
    assert!(started.elapsed() >= Duration::from_secs(30));
    pool.stop();
    runner.await??;

    let snapshot = harness.stats.snapshot();
    assert_eq!(snapshot.received, 2);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(harness.queue.inner.acked(), 1);
    assert_eq!(
        entries(&harness.log),
        vec![
            "declined:order-flaky".to_string(),
            "paid:order-flaky".to_string(),
            "ack:order-flaky".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_finishes_current_message_and_stops_pulling() -> Result<(), Box<dyn Error>> {
    let harness = Harness::new(1, Duration::from_secs(3), |_| false);
    for i in 0..3 {
        harness.publish(&format!("order-{i}"));
    }

    let pool = Arc::new(harness.pool(1, poll()));
    let runner = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.gate.in_use(), 1);
    let pulls_at_cancel = harness.queue.pulls();

    pool.stop();
    tokio::time::timeout(Duration::from_secs(10), runner).await???;

    assert_eq!(harness.queue.pulls(), pulls_at_cancel);
    let snapshot = harness.stats.snapshot();
    assert_eq!(snapshot.processed, 1);
    assert_eq!(snapshot.received, 1);
    assert_eq!(snapshot.active_workers, 0);
    assert_eq!(harness.queue.inner.acked(), 1);
    assert_eq!(harness.queue.inner.in_flight(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.queue.inner.visible(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_ack_still_counts_as_processed() -> Result<(), Box<dyn Error>> {
    let harness = Harness::new(1, Duration::from_millis(100), |_| false);
    harness.queue.fail_next_acks(1);
    harness.publish("order-1");

    let pool = Arc::new(harness.pool(1, poll()));
    let mut events = pool.subscribe();
    let runner = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let stats = harness.stats.clone();
    assert!(wait_until(Duration::from_secs(90), || stats.snapshot().processed == 2).await);
    pool.stop();
    runner.await??;

    assert_eq!(harness.stats.snapshot().failed, 0);
    assert_eq!(harness.queue.inner.acked(), 1);
    assert_eq!(harness.queue.inner.depth(), 0);

    let mut ack_failures = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ProcessorEvent::AckFailed { .. }) {
            ack_failures += 1;
        }
    }
    assert_eq!(ack_failures, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn pull_errors_back_off_and_recover() -> Result<(), Box<dyn Error>> {
    let harness = Harness::new(1, Duration::from_millis(100), |_| false);
    harness.queue.fail_next_pulls(2);
    harness.publish("order-1");

    let pool = Arc::new(harness.pool(1, poll()));
    let started = Instant::now();
    let runner = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.run().await })
    };

    let stats = harness.stats.clone();
    assert!(wait_until(Duration::from_secs(30), || stats.snapshot().processed == 1).await);
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(harness.queue.pulls() >= 3);

    pool.stop();
    runner.await??;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn process_message_reports_each_outcome() -> Result<(), Box<dyn Error>> {
    let harness = Harness::new(1, Duration::from_millis(10), |id| id == "order-bad");
    let ctx = WorkerContext {
        queue: harness.queue.clone(),
        decoder: OrderDecoder::new(),
        gate: harness.gate.clone(),
        stats: harness.stats.clone(),
        settings: poll(),
        event_tx: None,
    };

    harness.queue.inner.push(order_payload("order-ok"));
    harness.queue.inner.push(order_payload("order-bad"));
    harness.queue.inner.push(b"{}".to_vec());
    let mut batch = harness.queue.inner.pull(poll().pull_request()).await?;
    assert_eq!(batch.len(), 3);

    match process_message(&ctx, "worker-t", batch.remove(0)).await {
        MessageOutcome::Completed { order, acked, .. } => {
            assert_eq!(order.id(), "order-ok");
            assert_eq!(order.status(), OrderStatus::Completed);
            assert!(acked);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    match process_message(&ctx, "worker-t", batch.remove(0)).await {
        MessageOutcome::OperationFailed { order, .. } => {
            assert_eq!(order.status(), OrderStatus::Failed);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let outcome = process_message(&ctx, "worker-t", batch.remove(0)).await;
    assert!(matches!(outcome, MessageOutcome::DecodeFailed(_)));

    let snapshot = harness.stats.snapshot();
    assert_eq!(
        (snapshot.received, snapshot.processed, snapshot.failed),
        (3, 1, 2)
    );
    Ok(())
}
