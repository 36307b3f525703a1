//! # In-memory store.
//!
//! Default [`Store`] backend: a single `tokio::sync::Mutex` over the pending
//! queue, the state history, and the logs. Holding one lock for the whole
//! dequeue keeps select-and-remove atomic without any marking scheme.
//!
//! The pending queue is an unordered `Vec`; dequeue does a linear minimum
//! scan over eligible entries. That is O(n) per dequeue, which is fine for
//! the in-process queue depths this backend is meant for.

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use async_trait::async_trait;

use crate::error::Error;
use crate::jobs::{Instance, LogRecord, StateRecord};
use crate::query::Filter;

use super::Store;

#[derive(Default)]
struct Inner {
    pending: Vec<Instance>,
    history: Vec<StateRecord>,
    logs: Vec<LogRecord>,
}

/// Process-local [`Store`] holding everything behind one async mutex.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn enqueue_instance(&self, instance: Instance) -> Result<(), Error> {
        self.inner.lock().await.pending.push(instance);
        Ok(())
    }

    async fn dequeue_next_instance(&self) -> Result<Option<Instance>, Error> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;

        let best = inner
            .pending
            .iter()
            .enumerate()
            .filter(|(_, i)| i.scheduled_at <= now)
            .min_by(|(_, a), (_, b)| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.scheduled_at.cmp(&b.scheduled_at))
            })
            .map(|(idx, _)| idx);

        Ok(best.map(|idx| inner.pending.remove(idx)))
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, Error> {
        Ok(self.inner.lock().await.pending.clone())
    }

    async fn remove_instance(&self, uuid: Uuid) -> Result<bool, Error> {
        let mut inner = self.inner.lock().await;
        let before = inner.pending.len();
        inner.pending.retain(|i| i.uuid != uuid);
        Ok(inner.pending.len() < before)
    }

    async fn log_instance_state(&self, record: StateRecord) -> Result<(), Error> {
        self.inner.lock().await.history.push(record);
        Ok(())
    }

    async fn list_instance_history(&self, uuid: Option<Uuid>) -> Result<Vec<StateRecord>, Error> {
        let inner = self.inner.lock().await;
        let mut records: Vec<StateRecord> = inner
            .history
            .iter()
            .filter(|r| uuid.map_or(true, |u| r.uuid == u))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn clear_instance_history(&self, filter: &Filter) -> Result<usize, Error> {
        let mut inner = self.inner.lock().await;
        let before = inner.history.len();
        inner.history.retain(|r| !filter.matches(r.timestamp));
        Ok(before - inner.history.len())
    }

    async fn log_instance_message(&self, record: LogRecord) -> Result<(), Error> {
        self.inner.lock().await.logs.push(record);
        Ok(())
    }

    async fn list_instance_logs(&self, uuid: Option<Uuid>) -> Result<Vec<LogRecord>, Error> {
        let inner = self.inner.lock().await;
        let mut records: Vec<LogRecord> = inner
            .logs
            .iter()
            .filter(|r| uuid.map_or(true, |u| r.uuid == u))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn clear_instance_logs(&self, filter: &Filter) -> Result<usize, Error> {
        let mut inner = self.inner.lock().await;
        let before = inner.logs.len();
        inner.logs.retain(|r| !filter.matches(r.timestamp));
        Ok(before - inner.logs.len())
    }
}
