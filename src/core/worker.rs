//! # Worker: one dequeue-execute loop.
//!
//! A [`Worker`] repeatedly pulls the next eligible instance off the shared
//! [`Queue`] and drives it through its state machine: `Processing` per
//! attempt, then `Completed`, `Cancelled`, `TimedOut`, or `Terminated`.
//!
//! ## Attempt flow
//! ```text
//! dequeue ──► cancel check ──► Processing ──► invoke (under timeout)
//!                                  │              │
//!                                  │         Ok ──┼─► Completed (results)
//!                                  │              │
//!                                  │        Err ──┼─► on_error → None? ─► Completed
//!                                  │              ├─► retry budget left ─► backoff sleep ─► next attempt
//!                                  │              └─► exhausted ─► Terminated / TimedOut
//!                                  └─ cancel requested ─► Cancelled
//! ```
//!
//! ## Rules
//! - Attempts for one instance run sequentially on one worker; retry
//!   re-enters `Processing` on the **same** instance.
//! - Cancellation is cooperative, observed at safe points: before each
//!   attempt, at executor return, and during backoff sleep. A blocked
//!   callable is interrupted only by its timeout.
//! - Every transition is appended to the store best-effort; a failing append
//!   is logged and never aborts the loop.
//! - Worker-side errors never propagate to scheduling callers; they resolve
//!   into transitions, events, and callbacks.
//! - A cron-driven instance that ends in `Completed`, `Terminated`, or
//!   `TimedOut` schedules a fresh instance at the next occurrence;
//!   cancellation stops the recurrence.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::error::Error;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{opt, Instance, Job, JobState, LogLevel, Registry, Schedule};
use crate::policies::Policy;

use super::queue::Queue;

/// Uuids whose cancellation was requested but not yet observed.
pub(crate) type CancelSet = Arc<Mutex<HashSet<Uuid>>>;

/// One dequeue-execute loop bound to the shared queue.
pub struct Worker {
    id: usize,
    queue: Queue,
    registry: Arc<Registry>,
    bus: Bus,
    cancels: CancelSet,
    poll_interval: Duration,
    processing: Arc<AtomicBool>,
}

impl Worker {
    /// Creates a worker bound to the shared queue, registry, and bus.
    pub(crate) fn new(
        id: usize,
        queue: Queue,
        registry: Arc<Registry>,
        bus: Bus,
        cancels: CancelSet,
        poll_interval: Duration,
        processing: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            queue,
            registry,
            bus,
            cancels,
            poll_interval,
            processing,
        }
    }

    /// Worker id within the pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs the loop until `token` is cancelled.
    ///
    /// A cancel observed while an instance is executing finishes that
    /// instance first; the loop exits at the next dequeue point.
    pub async fn run(self, token: CancellationToken) {
        self.bus
            .publish(Event::now(EventKind::WorkerStarted).with_worker(self.id));

        loop {
            if token.is_cancelled() {
                break;
            }

            match self.queue.dequeue_next().await {
                Ok(Some(instance)) => {
                    self.processing.store(true, Ordering::SeqCst);
                    self.process(instance, &token).await;
                    self.processing.store(false, Ordering::SeqCst);
                }
                Ok(None) => {
                    if !self.idle_sleep(&token).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(worker = self.id, error = %e, "dequeue failed");
                    if !self.idle_sleep(&token).await {
                        break;
                    }
                }
            }
        }

        self.bus
            .publish(Event::now(EventKind::WorkerStopped).with_worker(self.id));
    }

    /// Sleeps one poll interval; `false` when cancelled mid-sleep.
    async fn idle_sleep(&self, token: &CancellationToken) -> bool {
        select! {
            _ = time::sleep(self.poll_interval) => true,
            _ = token.cancelled() => false,
        }
    }

    /// Drives one instance to a terminal state.
    async fn process(&self, mut instance: Instance, token: &CancellationToken) {
        let Some(job) = self.registry.lookup(&instance.kind).await else {
            let err = Error::NotFound {
                what: instance.kind.clone(),
            };
            self.finalize(None, &mut instance, err).await;
            return;
        };

        // Per-call overrides live on the instance; backoff comes from the
        // job's policy.
        let policy = job
            .policy()
            .clone()
            .with_max_retries(instance.max_retries)
            .with_timeout(instance.timeout);

        loop {
            if self.take_cancel(instance.uuid) {
                self.cancel(&job, &mut instance).await;
                return;
            }

            self.record(Some(&job), &mut instance, JobState::Processing, BTreeMap::new())
                .await;
            self.bus.publish(
                Event::now(EventKind::InstanceStarted)
                    .with_kind(instance.kind.clone())
                    .with_uuid(instance.uuid)
                    .with_attempt(instance.attempt_count),
            );
            self.log(
                &instance,
                LogLevel::Debug,
                format!("attempt {} started", instance.attempt_count),
            )
            .await;

            let result = self.invoke(&job, &instance, policy.timeout_opt()).await;

            // Executor-return safe point.
            if self.take_cancel(instance.uuid) {
                self.cancel(&job, &mut instance).await;
                return;
            }

            match result {
                Ok(results) => {
                    self.complete(&job, &mut instance, results).await;
                    self.respawn_cron(&job, &instance).await;
                    return;
                }
                Err(err) => {
                    self.publish_failure(&instance, &err);
                    self.log(
                        &instance,
                        LogLevel::Error,
                        format!("attempt {} failed: {err}", instance.attempt_count),
                    )
                    .await;

                    let err = match job.on_error() {
                        Some(hook) => {
                            let recovered = err.to_string();
                            match hook(&instance, err) {
                                Some(err) => err,
                                None => {
                                    self.recover(&job, &mut instance, recovered).await;
                                    self.respawn_cron(&job, &instance).await;
                                    return;
                                }
                            }
                        }
                        None => err,
                    };

                    if policy.should_retry(instance.attempt_count) {
                        if !self.backoff_sleep(&policy, &mut instance, &job, &err, token).await {
                            return;
                        }
                        continue;
                    }

                    self.finalize(Some(&job), &mut instance, err).await;
                    self.respawn_cron(&job, &instance).await;
                    return;
                }
            }
        }
    }

    /// Invokes the executor, bounded by the per-attempt timeout.
    async fn invoke(
        &self,
        job: &Job,
        instance: &Instance,
        timeout: Option<Duration>,
    ) -> Result<Vec<Value>, Error> {
        let fut = job.executor().invoke(instance.arguments.clone());
        match timeout {
            Some(limit) => match time::timeout(limit, fut).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout { timeout: limit }),
            },
            None => fut.await,
        }
    }

    /// Records success: results, `Completed`, `on_response`, event.
    async fn complete(&self, job: &Job, instance: &mut Instance, results: Vec<Value>) {
        instance.results = Some(results.clone());
        let mut options = BTreeMap::new();
        options.insert(opt::RESULTS.to_string(), json!(results));
        self.record(Some(job), instance, JobState::Completed, options)
            .await;

        if let Some(hook) = job.on_response() {
            hook(instance, &results);
        }
        self.bus.publish(
            Event::now(EventKind::InstanceCompleted)
                .with_kind(instance.kind.clone())
                .with_uuid(instance.uuid)
                .with_attempt(instance.attempt_count),
        );
        self.log(instance, LogLevel::Info, "completed".to_string())
            .await;
    }

    /// Records an `on_error` recovery as a completion without results.
    async fn recover(&self, job: &Job, instance: &mut Instance, recovered: String) {
        let mut options = BTreeMap::new();
        options.insert(opt::RECOVERED_ERROR.to_string(), json!(recovered));
        self.record(Some(job), instance, JobState::Completed, options)
            .await;

        self.bus.publish(
            Event::now(EventKind::InstanceCompleted)
                .with_kind(instance.kind.clone())
                .with_uuid(instance.uuid)
                .with_attempt(instance.attempt_count),
        );
        self.log(instance, LogLevel::Warn, "completed via error recovery".to_string())
            .await;
    }

    /// Records an observed cancel request.
    async fn cancel(&self, job: &Job, instance: &mut Instance) {
        self.record(Some(job), instance, JobState::Cancelled, BTreeMap::new())
            .await;
        self.bus.publish(
            Event::now(EventKind::InstanceCancelled)
                .with_kind(instance.kind.clone())
                .with_uuid(instance.uuid),
        );
        self.log(instance, LogLevel::Warn, "cancelled".to_string())
            .await;
    }

    /// Records retry-budget exhaustion.
    ///
    /// A timeout on the final attempt finalizes as `TimedOut`, every other
    /// error as `Terminated`.
    async fn finalize(&self, job: Option<&Job>, instance: &mut Instance, err: Error) {
        let state = if err.is_timeout() {
            JobState::TimedOut
        } else {
            JobState::Terminated
        };
        instance.error = Some(err.to_string());

        let mut options = BTreeMap::new();
        options.insert(opt::ERROR.to_string(), json!(err.to_string()));
        self.record(job, instance, state, options).await;

        self.bus.publish(
            Event::now(EventKind::InstanceTerminated)
                .with_kind(instance.kind.clone())
                .with_uuid(instance.uuid)
                .with_attempt(instance.attempt_count)
                .with_state(state)
                .with_reason(err.to_string()),
        );
        self.log(instance, LogLevel::Error, format!("{}: {err}", state.as_label()))
            .await;
    }

    /// Publishes the per-attempt failure event.
    fn publish_failure(&self, instance: &Instance, err: &Error) {
        let ev = match err {
            Error::Timeout { timeout } => Event::now(EventKind::InstanceTimedOut)
                .with_timeout(*timeout),
            _ => Event::now(EventKind::InstanceFailed).with_reason(err.to_string()),
        };
        self.bus.publish(
            ev.with_kind(instance.kind.clone())
                .with_uuid(instance.uuid)
                .with_attempt(instance.attempt_count),
        );
    }

    /// Sleeps the backoff delay before the next attempt.
    ///
    /// Returns `false` when a cancel arrived mid-sleep (the instance is then
    /// recorded as `Cancelled`).
    async fn backoff_sleep(
        &self,
        policy: &Policy,
        instance: &mut Instance,
        job: &Job,
        err: &Error,
        token: &CancellationToken,
    ) -> bool {
        let delay = policy.backoff.delay_for(instance.attempt_count);
        self.bus.publish(
            Event::now(EventKind::RetryScheduled)
                .with_kind(instance.kind.clone())
                .with_uuid(instance.uuid)
                .with_attempt(instance.attempt_count)
                .with_delay(delay)
                .with_reason(err.to_string()),
        );

        select! {
            _ = time::sleep(delay) => {
                if self.take_cancel(instance.uuid) {
                    self.cancel(job, instance).await;
                    return false;
                }
                true
            }
            _ = token.cancelled() => {
                self.cancel(job, instance).await;
                false
            }
        }
    }

    /// Schedules the next occurrence of a cron-driven instance.
    ///
    /// A fresh instance (new uuid, attempt count zero) inherits the finished
    /// one's arguments and overrides; the finished instance itself is never
    /// re-enqueued.
    async fn respawn_cron(&self, job: &Job, done: &Instance) {
        let Some(expr) = done.cron.as_deref() else {
            return;
        };
        let next_at = match Schedule::cron(expr) {
            Ok(schedule) => schedule.next(),
            Err(e) => {
                warn!(kind = %done.kind, error = %e, "cron re-parse failed, recurrence stops");
                return;
            }
        };
        let Some(next_at) = next_at else {
            return;
        };

        let mut next = Instance::new(done.kind.clone(), done.arguments.clone());
        next.priority = done.priority;
        next.max_retries = done.max_retries;
        next.timeout = done.timeout;
        next.scheduled_at = next_at;
        next.cron = done.cron.clone();

        let mut options = BTreeMap::new();
        options.insert(opt::ARGUMENTS.to_string(), json!(next.arguments));
        self.record(Some(job), &mut next, JobState::Created, options)
            .await;
        self.record(Some(job), &mut next, JobState::Scheduled, BTreeMap::new())
            .await;

        if let Err(e) = self.queue.enqueue(next.clone()).await {
            warn!(kind = %next.kind, error = %e, "cron re-enqueue failed");
            return;
        }
        self.bus.publish(
            Event::now(EventKind::InstanceScheduled)
                .with_kind(next.kind)
                .with_uuid(next.uuid),
        );
    }

    /// Appends a transition: history record, store append, state hook.
    ///
    /// A terminal transition also discards any cancel request that arrived
    /// too late to be observed, so the pending set cannot accumulate stale
    /// entries.
    async fn record(
        &self,
        job: Option<&Job>,
        instance: &mut Instance,
        state: JobState,
        options: BTreeMap<String, Value>,
    ) {
        let rec = instance.transition(state, options);
        if let Err(e) = self.queue.store().log_instance_state(rec).await {
            warn!(uuid = %instance.uuid, state = %state, error = %e, "history append failed");
        }
        if let Some(hook) = job.and_then(|j| j.on_state_change()) {
            hook(instance, state);
        }
        if state.is_final() {
            self.take_cancel(instance.uuid);
        }
    }

    /// Appends one instance log line, best-effort.
    async fn log(&self, instance: &Instance, level: LogLevel, message: String) {
        if let Err(e) = self.queue.store().logf(instance, level, message).await {
            warn!(uuid = %instance.uuid, error = %e, "log append failed");
        }
    }

    /// Consumes a pending cancel request for `uuid`, if any.
    fn take_cancel(&self, uuid: Uuid) -> bool {
        match self.cancels.lock() {
            Ok(mut set) => set.remove(&uuid),
            Err(poisoned) => poisoned.into_inner().remove(&uuid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Executor, Job};
    use crate::store::{MemoryStore, Store};

    fn parts() -> (Queue, Arc<Registry>, Bus, CancelSet, Arc<MemoryStore>) {
        let bus = Bus::new(16);
        let store = Arc::new(MemoryStore::new());
        let queue = Queue::new(store.clone() as Arc<dyn Store>);
        let registry = Arc::new(Registry::new(bus.clone()));
        let cancels: CancelSet = Arc::new(Mutex::new(HashSet::new()));
        (queue, registry, bus, cancels, store)
    }

    fn worker(queue: Queue, registry: Arc<Registry>, bus: Bus, cancels: CancelSet) -> Worker {
        Worker::new(
            0,
            queue,
            registry,
            bus,
            cancels,
            Duration::from_millis(10),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[tokio::test]
    async fn terminal_transition_discards_late_cancel_requests() {
        let (queue, registry, bus, cancels, store) = parts();
        let instance = Instance::new("flaky", vec![]);
        let uuid = instance.uuid;

        // The request lands after the executor-return safe point, via the
        // error hook, so neither check can observe it.
        let late = Arc::clone(&cancels);
        let job = Job::new(
            "flaky",
            Executor::from_fn0(|| -> Result<(), Error> { Err(Error::execution("boom")) }),
        )
        .with_on_error(move |_inst, err| {
            match late.lock() {
                Ok(mut set) => {
                    set.insert(uuid);
                }
                Err(poisoned) => {
                    poisoned.into_inner().insert(uuid);
                }
            }
            Some(err)
        });
        registry.register(job).await.unwrap();

        let w = worker(queue, registry, bus, Arc::clone(&cancels));
        w.process(instance, &CancellationToken::new()).await;

        let history = store.list_instance_history(Some(uuid)).await.unwrap();
        assert_eq!(history.last().unwrap().state, JobState::Terminated);
        assert!(cancels.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cron_instance_respawns_after_terminal_state() {
        let (queue, registry, bus, cancels, store) = parts();
        registry
            .register(Job::new("tick", Executor::from_fn0(|| ())))
            .await
            .unwrap();

        let mut instance = Instance::new("tick", vec![]);
        instance.cron = Some("* * * * * *".to_string());
        let first = instance.uuid;

        let w = worker(queue.clone(), registry, bus, cancels);
        w.process(instance, &CancellationToken::new()).await;

        let history = store.list_instance_history(Some(first)).await.unwrap();
        assert_eq!(history.last().unwrap().state, JobState::Completed);

        let pending = queue.list().await.unwrap();
        assert_eq!(pending.len(), 1);
        let next = &pending[0];
        assert_ne!(next.uuid, first);
        assert_eq!(next.kind, "tick");
        assert_eq!(next.cron.as_deref(), Some("* * * * * *"));
        assert_eq!(next.state(), JobState::Scheduled);
        assert_eq!(next.attempt_count, 0);
    }

    #[tokio::test]
    async fn cancelled_cron_instance_does_not_respawn() {
        let (queue, registry, bus, cancels, store) = parts();
        registry
            .register(Job::new("tick", Executor::from_fn0(|| ())))
            .await
            .unwrap();

        let mut instance = Instance::new("tick", vec![]);
        instance.cron = Some("* * * * * *".to_string());
        let uuid = instance.uuid;
        cancels.lock().unwrap().insert(uuid);

        let w = worker(queue.clone(), registry, bus, Arc::clone(&cancels));
        w.process(instance, &CancellationToken::new()).await;

        let history = store.list_instance_history(Some(uuid)).await.unwrap();
        assert_eq!(history.last().unwrap().state, JobState::Cancelled);
        assert!(queue.list().await.unwrap().is_empty());
        assert!(cancels.lock().unwrap().is_empty());
    }
}
