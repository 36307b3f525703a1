//! # Store-facing queue handle.
//!
//! [`Queue`] is the shared handle every worker and the manager use to reach
//! the pending-instance queue. It delegates ordering and atomicity to the
//! [`Store`]: `dequeue_next` hands out each instance at most once even under
//! arbitrary worker parallelism, because selection and removal happen inside
//! the store's own critical section.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::Error;
use crate::jobs::Instance;
use crate::store::Store;

/// Cloneable handle to the pending-instance queue.
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn Store>,
}

impl Queue {
    /// Creates a queue backed by `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Appends an instance to the queue.
    pub async fn enqueue(&self, instance: Instance) -> Result<(), Error> {
        self.store.enqueue_instance(instance).await
    }

    /// Removes and returns the next eligible instance, or `None`.
    ///
    /// Order: lowest priority value first, ties by earliest `scheduled_at`;
    /// only instances with `scheduled_at <= now` are eligible.
    pub async fn dequeue_next(&self) -> Result<Option<Instance>, Error> {
        self.store.dequeue_next_instance().await
    }

    /// Snapshots every pending instance.
    pub async fn list(&self) -> Result<Vec<Instance>, Error> {
        self.store.list_instances().await
    }

    /// Removes a pending instance by uuid; `Ok(true)` if one was removed.
    pub async fn remove(&self, uuid: Uuid) -> Result<bool, Error> {
        self.store.remove_instance(uuid).await
    }
}
