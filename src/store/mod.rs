//! # Persistence capability behind the engine.
//!
//! [`Store`] is the single seam between the engine and whatever holds its
//! data: the pending queue, the per-instance state history, and the
//! per-instance logs. The engine never touches storage directly; workers and
//! the manager go through an `Arc<dyn Store>`, so swapping the in-memory
//! default for a durable backend is a constructor argument, not a refactor.
//!
//! ## Contract
//! - `dequeue_next_instance` must atomically select-and-remove: under
//!   concurrent workers no instance may be handed out twice;
//! - eligibility: only instances with `scheduled_at <= now` may be dequeued;
//! - order: lowest [`Priority`](crate::Priority) value first, then earliest
//!   `scheduled_at`;
//! - `list_instance_history` returns records sorted by timestamp ascending.
//!
//! The bundled [`MemoryStore`] keeps everything in process memory and is the
//! default backend.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Error;
use crate::jobs::{Instance, LogLevel, LogRecord, StateRecord};
use crate::query::Filter;

/// Storage capability: queue, state history, and logs.
#[async_trait]
pub trait Store: Send + Sync {
    /// Appends an instance to the pending queue.
    async fn enqueue_instance(&self, instance: Instance) -> Result<(), Error>;

    /// Atomically removes and returns the next eligible instance, or `None`
    /// when nothing is eligible.
    ///
    /// Eligible means `scheduled_at <= now`; selection is lowest priority
    /// value first, ties broken by earliest `scheduled_at`.
    async fn dequeue_next_instance(&self) -> Result<Option<Instance>, Error>;

    /// Returns snapshots of all pending instances, in queue order.
    async fn list_instances(&self) -> Result<Vec<Instance>, Error>;

    /// Removes a pending instance by uuid; `Ok(true)` if one was removed.
    async fn remove_instance(&self, uuid: Uuid) -> Result<bool, Error>;

    /// Appends one state transition record.
    async fn log_instance_state(&self, record: StateRecord) -> Result<(), Error>;

    /// Returns state records, optionally restricted to one instance, sorted
    /// by timestamp ascending.
    async fn list_instance_history(&self, uuid: Option<Uuid>) -> Result<Vec<StateRecord>, Error>;

    /// Deletes state records whose timestamp matches `filter`.
    async fn clear_instance_history(&self, filter: &Filter) -> Result<usize, Error>;

    /// Appends one log record.
    async fn log_instance_message(&self, record: LogRecord) -> Result<(), Error>;

    /// Appends one log line for `instance` at the current time.
    async fn logf(&self, instance: &Instance, level: LogLevel, message: String) -> Result<(), Error> {
        self.log_instance_message(LogRecord::now(instance, level, message))
            .await
    }

    /// Returns log records, optionally restricted to one instance, sorted by
    /// timestamp ascending.
    async fn list_instance_logs(&self, uuid: Option<Uuid>) -> Result<Vec<LogRecord>, Error>;

    /// Deletes log records whose timestamp matches `filter`.
    async fn clear_instance_logs(&self, filter: &Filter) -> Result<usize, Error>;
}
