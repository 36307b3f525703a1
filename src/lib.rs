//! # jobvisor
//!
//! An embeddable async job engine: register job definitions, schedule
//! instances (immediately, at an instant, or on a cron cadence), and let a
//! resizable worker pool execute them with retries, backoff, timeouts, and
//! cooperative cancellation. Every lifecycle step is recorded as an
//! append-only history and published on an event bus.
//!
//! ## Architecture
//! ```text
//! Manager (top-level API)
//!   ├── Registry: kind → Job (executor + policy + schedule + callbacks)
//!   ├── Store: pending queue + state history + instance logs
//!   │     └── MemoryStore (default, in-process)
//!   ├── WorkerPool
//!   │     ├── Worker 0 ─┐
//!   │     ├── Worker 1 ─┼─► dequeue (priority asc, scheduled_at asc)
//!   │     └── Worker N ─┘        │
//!   │                            ▼
//!   │            Processing ─► Completed / Cancelled / TimedOut / Terminated
//!   │                            │
//!   └── Bus ◄────────────────────┘ (lifecycle events)
//!         └─► SubscriberSet ─► Subscribe impls (logging, metrics, ...)
//! ```
//!
//! ## Instance lifecycle
//! ```text
//! Created → Scheduled → Processing ──► Completed
//!                           │   ▲  └─► Terminated
//!                           │   └────── (retry re-enters Processing)
//!                           ├─────────► TimedOut
//!                           └─────────► Cancelled
//! ```
//!
//! ## Example
//! ```rust
//! use jobvisor::{Executor, Job, Manager, Policy, ScheduleOptions};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), jobvisor::Error> {
//!     let manager = Manager::builder().build();
//!     manager.start().await?;
//!
//!     let job = Job::new("sum", Executor::from_fn2(|a: i64, b: i64| a + b))
//!         .with_policy(Policy::default().with_max_retries(2));
//!     manager.register_job(job).await?;
//!
//!     // Arguments are coerced: "2" parses into the declared i64 parameter.
//!     let inst = manager
//!         .schedule_registered("sum", ScheduleOptions::new(vec![json!(1), json!("2")]))
//!         .await?;
//!
//!     tokio::time::sleep(Duration::from_millis(200)).await;
//!     manager.stop_wait().await?;
//!
//!     let history = manager
//!         .lookup_instance_history(&jobvisor::Query::unset().with_uuid(inst.uuid))
//!         .await?;
//!     assert!(!history.is_empty());
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//! - **Dequeue order**: lowest priority value first, ties by earliest
//!   `scheduled_at`; only instances whose `scheduled_at` has passed are
//!   eligible; no instance is handed to two workers.
//! - **History**: exactly one `Created` record per instance, always first;
//!   `attempt_count` increments only on entering `Processing`; terminal
//!   instances are never re-enqueued. A cron cadence recurs by scheduling a
//!   fresh instance per occurrence, until cancelled.
//! - **Scheduling never blocks** on execution; argument arity/coercion
//!   errors surface to the scheduling caller before anything is enqueued.
//! - **Cancellation is cooperative**: observed before an attempt, at
//!   executor return, and during backoff; a blocked callable is interrupted
//!   only by its timeout.

pub mod core;
pub mod error;
pub mod events;
pub mod jobs;
pub mod policies;
pub mod query;
pub mod store;
pub mod subscribers;

pub use crate::core::{
    Manager, ManagerBuilder, ManagerConfig, Queue, ScheduleOptions, Worker, WorkerPool,
};
pub use crate::error::Error;
pub use crate::events::{Bus, Event, EventKind};
pub use crate::jobs::{
    opt, ArgKind, ExecFn, ExecFuture, Executor, FromValue, Instance, IntoValues, Job, JobState,
    LevelMask, LogLevel, LogRecord, Registry, Schedule, StateMask, StateRecord,
};
pub use crate::policies::{BackoffPolicy, JitterPolicy, Policy, Priority};
pub use crate::query::{Filter, Query};
pub use crate::store::{MemoryStore, Store};
pub use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};
