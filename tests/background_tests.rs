//! Tests for the background job queue
//!
//! # Test Coverage
//!
//! - Jobs enqueue without blocking and execute exactly once
//! - Job panics are contained: logged, counted, workers keep running
//! - The queue sheds above its bound and counts what it shed
//! - Metrics reconcile (dispatched == completed once drained)

use camshaft::background::BackgroundQueue;
use camshaft::runtime_config::BackgroundConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod tracing_util;
use tracing_util::TestTracing;

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn jobs_execute_exactly_once() {
    let _tracing = TestTracing::init();
    let queue = unsafe { BackgroundQueue::start(BackgroundConfig::default()) };
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..100 {
        let counter = Arc::clone(&counter);
        assert!(queue.spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }

    assert!(wait_until(Duration::from_secs(5), || counter
        .load(Ordering::SeqCst)
        == 100));
    assert_eq!(counter.load(Ordering::SeqCst), 100);
    assert!(wait_until(Duration::from_secs(5), || queue
        .metrics()
        .completed()
        == 100));
    assert_eq!(queue.metrics().dispatched(), 100);
    assert_eq!(queue.metrics().shed(), 0);
}

#[test]
fn panicking_job_does_not_kill_the_workers() {
    let _tracing = TestTracing::init();
    let queue = unsafe { BackgroundQueue::start(BackgroundConfig::default()) };
    let survived = Arc::new(AtomicUsize::new(0));

    assert!(queue.spawn(|| panic!("job blew up")));
    let counter = Arc::clone(&survived);
    assert!(queue.spawn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert!(wait_until(Duration::from_secs(5), || survived
        .load(Ordering::SeqCst)
        == 1));
    // The panicked job still counts as completed; it is not retried.
    assert!(wait_until(Duration::from_secs(5), || queue
        .metrics()
        .completed()
        == 2));
}

#[test]
fn queue_sheds_jobs_above_its_bound() {
    let _tracing = TestTracing::init();
    let config = BackgroundConfig {
        workers: 1,
        queue_bound: 2,
        stack_size: 0x10000,
    };
    let queue = unsafe { BackgroundQueue::start(config) };

    let release = Arc::new(AtomicUsize::new(0));
    let gate = Arc::clone(&release);
    // Occupy the single worker so the queue can fill.
    assert!(queue.spawn(move || {
        while gate.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
    }));

    let mut accepted: u64 = 1;
    let mut shed: u64 = 0;
    for _ in 0..10 {
        if queue.spawn(|| {}) {
            accepted += 1;
        } else {
            shed += 1;
        }
    }
    assert!(shed > 0, "expected jobs to be shed at bound 2");
    assert_eq!(queue.metrics().shed(), shed);

    release.store(1, Ordering::SeqCst);
    assert!(wait_until(Duration::from_secs(5), || {
        queue.metrics().completed() == accepted
    }));
}

#[test]
fn enqueue_returns_before_the_job_runs() {
    let _tracing = TestTracing::init();
    let queue = unsafe { BackgroundQueue::start(BackgroundConfig::default()) };
    let finished = Arc::new(AtomicUsize::new(0));

    let flag = Arc::clone(&finished);
    let enqueued_at = Instant::now();
    assert!(queue.spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        flag.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(
        enqueued_at.elapsed() < Duration::from_millis(50),
        "spawn must not wait for the job"
    );
    assert!(wait_until(Duration::from_secs(5), || finished
        .load(Ordering::SeqCst)
        == 1));
}
