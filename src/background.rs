//! # Background Task Queue
//!
//! Fire-and-forget jobs decoupled from the request lifecycle.
//!
//! A [`BackgroundQueue`] owns a pool of worker coroutines draining a shared
//! channel. `spawn` enqueues and returns immediately; each job runs exactly
//! once on some worker. Job panics are caught and logged — they never
//! propagate to the enqueuing request or take a worker down. When the queue
//! depth reaches the configured bound new jobs are shed (and counted) rather
//! than queued without limit.

use crate::runtime_config::BackgroundConfig;
use may::sync::mpsc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A queued unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Counters for queue monitoring. All atomics with relaxed ordering: the
/// numbers are for observation, not coordination.
#[derive(Debug, Default)]
pub struct BackgroundMetrics {
    queue_depth: AtomicUsize,
    dispatched: AtomicU64,
    completed: AtomicU64,
    shed: AtomicU64,
}

impl BackgroundMetrics {
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn shed(&self) -> u64 {
        self.shed.load(Ordering::Relaxed)
    }

    fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_shed(&self) {
        self.shed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Bounded fire-and-forget job queue backed by worker coroutines.
pub struct BackgroundQueue {
    sender: mpsc::Sender<Job>,
    metrics: Arc<BackgroundMetrics>,
    queue_bound: usize,
}

impl BackgroundQueue {
    /// Start the worker pool.
    ///
    /// # Safety
    ///
    /// Spawns worker coroutines via `may::coroutine::Builder::spawn()`, which
    /// is unsafe in the `may` runtime. The caller must ensure the coroutine
    /// runtime is initialized before starting the queue.
    #[must_use]
    pub unsafe fn start(config: BackgroundConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(rx);
        let metrics = Arc::new(BackgroundMetrics::default());

        for worker_id in 0..config.workers.max(1) {
            let rx = Arc::clone(&rx);
            let metrics = Arc::clone(&metrics);

            // SAFETY: spawn is unsafe per the may runtime contract; workers
            // own their captures and exit when the channel closes.
            let spawned = unsafe {
                may::coroutine::Builder::new()
                    .stack_size(config.stack_size)
                    .spawn(move || {
                        debug!(worker_id, "background worker started");
                        while let Ok(job) = rx.recv() {
                            if let Err(panic) =
                                std::panic::catch_unwind(std::panic::AssertUnwindSafe(job))
                            {
                                // Failures are logged, never propagated.
                                error!(worker_id, panic = ?panic, "background job panicked");
                            }
                            metrics.record_completion();
                        }
                        debug!(worker_id, "background worker exiting");
                    })
            };
            if let Err(err) = spawned {
                error!(worker_id, error = %err, "failed to spawn background worker");
            }
        }

        Self {
            sender: tx,
            metrics,
            queue_bound: config.queue_bound,
        }
    }

    /// Enqueue a job and return immediately.
    ///
    /// Returns `false` when the job was shed: the queue is at its bound or
    /// the workers have exited. Shed jobs are logged and counted, never
    /// silently dropped.
    pub fn spawn<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.metrics.queue_depth() >= self.queue_bound {
            warn!(
                queue_bound = self.queue_bound,
                "background queue full; shedding job"
            );
            self.metrics.record_shed();
            return false;
        }
        self.metrics.record_dispatch();
        if self.sender.send(Box::new(job)).is_err() {
            error!("background workers are not running; job dropped");
            self.metrics.record_completion();
            self.metrics.record_shed();
            return false;
        }
        true
    }

    #[must_use]
    pub fn metrics(&self) -> &BackgroundMetrics {
        &self.metrics
    }
}

impl std::fmt::Debug for BackgroundQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundQueue")
            .field("queue_bound", &self.queue_bound)
            .field("queue_depth", &self.metrics.queue_depth())
            .finish()
    }
}
