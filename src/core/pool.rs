//! # WorkerPool: start/stop/resize over N workers on one queue.
//!
//! The pool owns the worker handles. Each worker gets its own
//! [`CancellationToken`] and an `AtomicBool` processing flag; stopping is
//! cooperative (a worker finishes its current instance before exiting).
//!
//! ## Resize exclusivity
//! `resize` takes a non-blocking `try_lock` on a dedicated mutex: a resize
//! racing another resize fails immediately with [`Error::Busy`] instead of
//! queueing. Growth binds new workers to the same queue; shrink waits for the
//! excess workers to finish their current instance before stopping them.
//! `stop` takes the same mutex blocking, so shutdown waits out an in-flight
//! resize instead of failing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::Registry;

use super::queue::Queue;
use super::worker::{CancelSet, Worker};

/// How often `stop_wait` and shrink re-check a worker's processing flag.
const DRAIN_POLL: Duration = Duration::from_millis(10);

struct WorkerHandle {
    id: usize,
    token: CancellationToken,
    processing: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Owns and resizes the set of workers sharing one queue.
pub struct WorkerPool {
    queue: Queue,
    registry: Arc<Registry>,
    bus: Bus,
    cancels: CancelSet,
    poll_interval: Duration,
    workers: Mutex<Vec<WorkerHandle>>,
    resize_lock: Mutex<()>,
    next_id: AtomicUsize,
}

impl WorkerPool {
    /// Creates an empty pool; call [`WorkerPool::resize`] to launch workers.
    pub(crate) fn new(
        queue: Queue,
        registry: Arc<Registry>,
        bus: Bus,
        cancels: CancelSet,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            registry,
            bus,
            cancels,
            poll_interval,
            workers: Mutex::new(Vec::new()),
            resize_lock: Mutex::new(()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Current number of workers.
    pub async fn num_workers(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Resizes the pool to `n` workers.
    ///
    /// - `n == 0` fails with [`Error::Invalid`] (use [`WorkerPool::stop`]);
    /// - `n == current` is a no-op;
    /// - a concurrent resize fails immediately with [`Error::Busy`];
    /// - shrink waits for the excess workers' current instances to finish.
    pub async fn resize(&self, n: usize) -> Result<(), Error> {
        if n == 0 {
            return Err(Error::invalid("pool size must be at least 1"));
        }
        let _guard = self.resize_lock.try_lock().map_err(|_| Error::Busy)?;

        let mut workers = self.workers.lock().await;
        let current = workers.len();
        if n == current {
            return Ok(());
        }

        if n > current {
            for _ in current..n {
                let handle = self.spawn_worker();
                workers.push(handle);
            }
        } else {
            let excess: Vec<WorkerHandle> = workers.drain(n..).collect();
            drop(workers);
            self.drain(excess).await?;
            workers = self.workers.lock().await;
        }

        let size = workers.len();
        drop(workers);
        self.bus
            .publish(Event::now(EventKind::PoolResized).with_workers(size));
        Ok(())
    }

    /// Signals every worker to exit after its current instance and waits for
    /// the loops to finish.
    ///
    /// Unlike [`WorkerPool::resize`], stopping is never fail-fast: a resize
    /// in flight is waited out, then the pool shuts down.
    pub async fn stop(&self) -> Result<(), Error> {
        let _guard = self.resize_lock.lock().await;
        let handles: Vec<WorkerHandle> = {
            let mut workers = self.workers.lock().await;
            workers.drain(..).collect()
        };

        let mut failures = Vec::new();
        for h in handles {
            h.token.cancel();
            if let Err(e) = h.join.await {
                failures.push(format!("worker {}: {e}", h.id));
            }
        }
        aggregate(failures)
    }

    /// Waits for every in-flight instance to finish, then stops.
    pub async fn stop_wait(&self) -> Result<(), Error> {
        loop {
            let busy = {
                let workers = self.workers.lock().await;
                workers
                    .iter()
                    .any(|h| h.processing.load(Ordering::SeqCst))
            };
            if !busy {
                break;
            }
            time::sleep(DRAIN_POLL).await;
        }
        self.stop().await
    }

    /// Spawns one worker on the shared queue.
    fn spawn_worker(&self) -> WorkerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let processing = Arc::new(AtomicBool::new(false));

        let worker = Worker::new(
            id,
            self.queue.clone(),
            Arc::clone(&self.registry),
            self.bus.clone(),
            Arc::clone(&self.cancels),
            self.poll_interval,
            Arc::clone(&processing),
        );
        let join = tokio::spawn(worker.run(token.clone()));

        WorkerHandle {
            id,
            token,
            processing,
            join,
        }
    }

    /// Stops a drained set of handles, waiting out in-flight instances.
    async fn drain(&self, handles: Vec<WorkerHandle>) -> Result<(), Error> {
        let mut failures = Vec::new();
        for h in handles {
            while h.processing.load(Ordering::SeqCst) {
                time::sleep(DRAIN_POLL).await;
            }
            h.token.cancel();
            if let Err(e) = h.join.await {
                failures.push(format!("worker {}: {e}", h.id));
            }
        }
        aggregate(failures)
    }
}

/// Joins partial failures into one execution error.
fn aggregate(failures: Vec<String>) -> Result<(), Error> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::execution(failures.join("; ")))
    }
}
