//! # Manager: the engine's top-level API.
//!
//! The [`Manager`] wires the registry, store, queue, pool, bus, and
//! subscriber fan-out together. It is the only type most embedders touch:
//! register jobs, start the pool, schedule instances, inspect history,
//! cancel, stop.
//!
//! ## Scheduling flow
//! ```text
//! schedule_registered(kind, opts)
//!   ├─► lookup definition, check arguments (arity + coercion, no invocation)
//!   ├─► build Instance (per-call overrides over the job's policy)
//!   ├─► record Created, record Scheduled
//!   ├─► enqueue ──► Store
//!   └─► publish InstanceScheduled, return snapshot (never blocks on execution)
//! ```
//!
//! ## Example
//! ```rust
//! use jobvisor::{Executor, Job, Manager, ScheduleOptions};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), jobvisor::Error> {
//! let manager = Manager::builder().build();
//! manager.start().await?;
//!
//! manager
//!     .register_job(Job::new("sum", Executor::from_fn2(|a: i64, b: i64| a + b)))
//!     .await?;
//!
//! let inst = manager
//!     .schedule_registered("sum", ScheduleOptions::new(vec![json!(1), json!(2)]))
//!     .await?;
//! assert_eq!(inst.kind, "sum");
//!
//! manager.stop_wait().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Error;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{
    opt, Instance, Job, JobState, LogRecord, Registry, Schedule, StateRecord,
};
use crate::policies::Priority;
use crate::query::{Filter, Query};
use crate::store::{MemoryStore, Store};
use crate::subscribers::{Subscribe, SubscriberSet};

use super::config::ManagerConfig;
use super::pool::WorkerPool;
use super::queue::Queue;
use super::shutdown;
use super::worker::CancelSet;

/// Per-call overrides applied when scheduling an instance.
///
/// Unset fields fall back to the job's [`Policy`](crate::Policy) and
/// [`Schedule`].
#[derive(Clone, Debug, Default)]
pub struct ScheduleOptions {
    /// Ordered invocation arguments.
    pub arguments: Vec<Value>,
    /// Queue precedence override.
    pub priority: Option<Priority>,
    /// Schedule override.
    pub schedule: Option<Schedule>,
    /// Per-attempt timeout override.
    pub timeout: Option<Duration>,
    /// Retry budget override.
    pub max_retries: Option<i32>,
}

impl ScheduleOptions {
    /// Options carrying only arguments; everything else from the job.
    pub fn new(arguments: Vec<Value>) -> Self {
        Self {
            arguments,
            ..Self::default()
        }
    }

    /// Overrides the queue precedence.
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Overrides the schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Overrides the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the retry budget.
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Builder for a [`Manager`].
#[derive(Default)]
pub struct ManagerBuilder {
    config: ManagerConfig,
    store: Option<Arc<dyn Store>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ManagerBuilder {
    /// Sets the configuration.
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the storage backend (default: [`MemoryStore`]).
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Adds an event subscriber.
    pub fn with_subscriber(mut self, sub: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(sub);
        self
    }

    /// Wires everything together. The pool starts empty; call
    /// [`Manager::start`].
    pub fn build(self) -> Manager {
        let bus = Bus::new(self.config.bus_capacity);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);
        let queue = Queue::new(Arc::clone(&store));
        let registry = Arc::new(Registry::new(bus.clone()));
        let cancels: CancelSet = Arc::new(Mutex::new(HashSet::new()));

        let pool = WorkerPool::new(
            queue.clone(),
            Arc::clone(&registry),
            bus.clone(),
            Arc::clone(&cancels),
            self.config.poll_interval,
        );

        let subs = Arc::new(SubscriberSet::with_bus(self.subscribers, bus.clone()));
        if !subs.is_empty() {
            subscriber_listener(&bus, Arc::clone(&subs));
        }

        Manager {
            config: self.config,
            store,
            queue,
            registry,
            bus,
            pool,
            cancels,
            _subs: subs,
        }
    }
}

/// Subscribes to the bus and forwards events to the fan-out set.
fn subscriber_listener(bus: &Bus, subs: Arc<SubscriberSet>) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(ev) = rx.recv().await {
            subs.emit(&ev);
        }
    });
}

/// Top-level engine handle: registration, scheduling, inspection, lifecycle.
pub struct Manager {
    config: ManagerConfig,
    store: Arc<dyn Store>,
    queue: Queue,
    registry: Arc<Registry>,
    bus: Bus,
    pool: WorkerPool,
    cancels: CancelSet,
    _subs: Arc<SubscriberSet>,
}

impl Manager {
    /// Starts building a manager.
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::default()
    }

    /// A manager with the given config, an in-memory store, and no
    /// subscribers.
    pub fn new(config: ManagerConfig) -> Self {
        Self::builder().with_config(config).build()
    }

    /// The storage backend.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Opens a receiver on the event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Launches the configured number of workers.
    pub async fn start(&self) -> Result<(), Error> {
        self.pool.resize(self.config.workers).await
    }

    /// Signals workers to exit after their current instance and waits.
    pub async fn stop(&self) -> Result<(), Error> {
        self.bus.publish(Event::now(EventKind::ShutdownRequested));
        self.pool.stop().await
    }

    /// Waits for all in-flight instances to finish, then stops.
    pub async fn stop_wait(&self) -> Result<(), Error> {
        self.bus.publish(Event::now(EventKind::ShutdownRequested));
        self.pool.stop_wait().await
    }

    /// Resizes the pool; see [`WorkerPool::resize`] for the rules.
    pub async fn resize(&self, n: usize) -> Result<(), Error> {
        self.pool.resize(n).await
    }

    /// Current number of workers.
    pub async fn num_workers(&self) -> usize {
        self.pool.num_workers().await
    }

    /// Starts the pool and blocks until SIGINT/SIGTERM, then drains and
    /// stops.
    pub async fn run_until_shutdown(&self) -> Result<(), Error> {
        self.start().await?;
        shutdown::wait_for_shutdown_signal()
            .await
            .map_err(Error::execution)?;
        self.stop_wait().await
    }

    /// Registers a job definition.
    pub async fn register_job(&self, job: Job) -> Result<(), Error> {
        self.registry.register(job).await
    }

    /// Removes a job definition.
    pub async fn unregister_job(&self, kind: &str) -> Result<(), Error> {
        self.registry.unregister(kind).await
    }

    /// All registered definitions, sorted by kind.
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.registry.list().await
    }

    /// Schedules an instance of `job`, registering the definition first if
    /// its kind is unknown.
    ///
    /// Workers resolve the executor through the registry, so the definition
    /// must be registered for the instance to run.
    pub async fn schedule_job(&self, job: Job, opts: ScheduleOptions) -> Result<Instance, Error> {
        if !self.registry.contains(job.kind()).await {
            self.registry.register(job.clone()).await?;
        }
        self.schedule_registered(job.kind(), opts).await
    }

    /// Schedules an instance of a registered kind.
    ///
    /// Argument arity/coercion problems surface here, before anything is
    /// enqueued. Returns the instance snapshot without waiting for
    /// execution.
    ///
    /// A cron schedule recurs: once the instance reaches a terminal state
    /// (cancellation excepted), the worker schedules a fresh instance at the
    /// next occurrence.
    pub async fn schedule_registered(
        &self,
        kind: &str,
        opts: ScheduleOptions,
    ) -> Result<Instance, Error> {
        let job = self.registry.lookup(kind).await.ok_or(Error::NotFound {
            what: kind.to_string(),
        })?;
        job.executor().check(&opts.arguments)?;

        let schedule = opts
            .schedule
            .unwrap_or_else(|| job.schedule().clone());
        let scheduled_at = schedule
            .next()
            .ok_or_else(|| Error::invalid("schedule has no upcoming occurrence"))?;

        let mut instance = Instance::new(kind, opts.arguments);
        instance.priority = opts.priority.unwrap_or(job.policy().priority);
        instance.max_retries = opts.max_retries.unwrap_or(job.policy().max_retries);
        instance.timeout = opts.timeout.unwrap_or(job.policy().timeout);
        instance.scheduled_at = scheduled_at;
        instance.cron = schedule.cron_expr().map(str::to_owned);

        let mut options = BTreeMap::new();
        options.insert(opt::ARGUMENTS.to_string(), json!(instance.arguments));
        self.record(&job, &mut instance, JobState::Created, options)
            .await?;
        self.record(&job, &mut instance, JobState::Scheduled, BTreeMap::new())
            .await?;

        self.queue.enqueue(instance.clone()).await?;
        self.bus.publish(
            Event::now(EventKind::InstanceScheduled)
                .with_kind(instance.kind.clone())
                .with_uuid(instance.uuid),
        );
        Ok(instance)
    }

    /// Pending instances matching `query`.
    pub async fn lookup_instances(&self, query: &Query) -> Result<Vec<Instance>, Error> {
        let pending = self.queue.list().await?;
        Ok(pending
            .into_iter()
            .filter(|i| query.matches_instance(i))
            .collect())
    }

    /// State records matching `query`, sorted by timestamp ascending.
    pub async fn lookup_instance_history(&self, query: &Query) -> Result<Vec<StateRecord>, Error> {
        let records = self.store.list_instance_history(query.uuid).await?;
        Ok(records
            .into_iter()
            .filter(|r| query.matches_state(r))
            .collect())
    }

    /// Log records matching `query`, sorted by timestamp ascending.
    pub async fn lookup_instance_logs(&self, query: &Query) -> Result<Vec<LogRecord>, Error> {
        let records = self.store.list_instance_logs(query.uuid).await?;
        Ok(records
            .into_iter()
            .filter(|r| query.matches_log(r))
            .collect())
    }

    /// Requests cancellation of an instance.
    ///
    /// A pending instance is removed from the queue and recorded `Cancelled`
    /// immediately. An executing instance gets a cooperative cancel request
    /// its worker observes at the next safe point. Fails with
    /// [`Error::NotFound`] for an unknown uuid and [`Error::Invalid`] for an
    /// already-final one.
    pub async fn cancel_instance(&self, uuid: Uuid) -> Result<(), Error> {
        let pending = self.queue.list().await?;
        if let Some(instance) = pending.into_iter().find(|i| i.uuid == uuid) {
            if self.queue.remove(uuid).await? {
                let job = self.registry.lookup(&instance.kind).await;
                let mut instance = instance;
                self.record_opt(job.as_ref(), &mut instance, JobState::Cancelled)
                    .await?;
                self.bus.publish(
                    Event::now(EventKind::InstanceCancelled)
                        .with_kind(instance.kind.clone())
                        .with_uuid(uuid),
                );
                return Ok(());
            }
            // Raced with a worker dequeue: fall through to the cooperative
            // path.
        }

        let history = self.store.list_instance_history(Some(uuid)).await?;
        let last = history.last().ok_or(Error::NotFound {
            what: uuid.to_string(),
        })?;
        if last.state.is_final() {
            return Err(Error::invalid(format!(
                "instance {uuid} is already {}",
                last.state
            )));
        }

        match self.cancels.lock() {
            Ok(mut set) => {
                set.insert(uuid);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(uuid);
            }
        }
        Ok(())
    }

    /// Removes every definition, pending instance, history record, and log.
    pub async fn clear(&self) -> Result<(), Error> {
        self.registry.clear().await;
        for instance in self.queue.list().await? {
            self.queue.remove(instance.uuid).await?;
        }
        self.store.clear_instance_history(&Filter::unset()).await?;
        self.store.clear_instance_logs(&Filter::unset()).await?;
        Ok(())
    }

    /// Appends a transition during scheduling, firing the state hook.
    async fn record(
        &self,
        job: &Job,
        instance: &mut Instance,
        state: JobState,
        options: BTreeMap<String, Value>,
    ) -> Result<(), Error> {
        let rec = instance.transition(state, options);
        self.store.log_instance_state(rec).await?;
        if let Some(hook) = job.on_state_change() {
            hook(instance, state);
        }
        Ok(())
    }

    /// Like [`Manager::record`], for a possibly-unregistered kind.
    async fn record_opt(
        &self,
        job: Option<&Job>,
        instance: &mut Instance,
        state: JobState,
    ) -> Result<(), Error> {
        let rec = instance.transition(state, BTreeMap::new());
        self.store.log_instance_state(rec).await?;
        if let Some(hook) = job.and_then(|j| j.on_state_change()) {
            hook(instance, state);
        }
        Ok(())
    }
}
