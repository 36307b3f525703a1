//! # Job registry - kind → definition map.
//!
//! The registry owns [`Job`] definitions for their registered lifetime.
//! Registration and unregistration publish [`EventKind::JobRegistered`] /
//! [`EventKind::JobUnregistered`] on the bus — the externally observed
//! registered-count signal consumed by metrics subscribers.
//!
//! ## Rules
//! - `register` fails with `AlreadyExists` for a taken kind (re-registration
//!   is rejected, definitions stay immutable);
//! - `unregister` fails with `NotFound` for an absent kind;
//! - lookups return clones (definitions are `Arc`-backed and cheap to clone).

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::Error;
use crate::events::{Bus, Event, EventKind};

use super::job::Job;

/// Thread-safe kind → [`Job`] map.
pub struct Registry {
    jobs: RwLock<HashMap<String, Job>>,
    bus: Bus,
}

impl Registry {
    /// Creates an empty registry publishing on `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Registers a definition.
    ///
    /// Fails with [`Error::Invalid`] for an empty kind and
    /// [`Error::AlreadyExists`] for a taken one.
    pub async fn register(&self, job: Job) -> Result<(), Error> {
        let kind = job.kind().to_string();
        if kind.is_empty() {
            return Err(Error::invalid("job kind cannot be empty"));
        }

        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&kind) {
            return Err(Error::AlreadyExists { what: kind });
        }
        jobs.insert(kind.clone(), job);
        drop(jobs);

        self.bus
            .publish(Event::now(EventKind::JobRegistered).with_kind(kind));
        Ok(())
    }

    /// Removes a definition; fails with [`Error::NotFound`] if absent.
    pub async fn unregister(&self, kind: &str) -> Result<(), Error> {
        let mut jobs = self.jobs.write().await;
        if jobs.remove(kind).is_none() {
            return Err(Error::NotFound {
                what: kind.to_string(),
            });
        }
        drop(jobs);

        self.bus
            .publish(Event::now(EventKind::JobUnregistered).with_kind(kind));
        Ok(())
    }

    /// Returns a clone of the definition for `kind`, if registered.
    pub async fn lookup(&self, kind: &str) -> Option<Job> {
        self.jobs.read().await.get(kind).cloned()
    }

    /// True if `kind` is registered.
    pub async fn contains(&self, kind: &str) -> bool {
        self.jobs.read().await.contains_key(kind)
    }

    /// Returns all registered definitions, sorted by kind.
    pub async fn list(&self) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| a.kind().cmp(b.kind()));
        all
    }

    /// Number of registered kinds.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// True if no kinds are registered.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Removes every definition.
    pub async fn clear(&self) {
        let kinds: Vec<String> = {
            let mut jobs = self.jobs.write().await;
            jobs.drain().map(|(kind, _)| kind).collect()
        };
        for kind in kinds {
            self.bus
                .publish(Event::now(EventKind::JobUnregistered).with_kind(kind));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Executor;

    fn noop_job(kind: &str) -> Job {
        Job::new(kind, Executor::from_fn0(|| ()))
    }

    #[tokio::test]
    async fn register_then_lookup_round_trips() {
        let reg = Registry::new(Bus::new(8));
        reg.register(noop_job("a")).await.unwrap();
        reg.register(noop_job("b")).await.unwrap();

        let got = reg.lookup("a").await.expect("registered");
        assert_eq!(got.kind(), "a");
        assert!(reg.contains("b").await);
        assert_eq!(reg.len().await, 2);

        let listed = reg.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].kind(), "a");
        assert_eq!(listed[1].kind(), "b");
    }

    #[tokio::test]
    async fn duplicate_kind_is_rejected() {
        let reg = Registry::new(Bus::new(8));
        reg.register(noop_job("dup")).await.unwrap();
        let err = reg.register(noop_job("dup")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn empty_kind_is_invalid() {
        let reg = Registry::new(Bus::new(8));
        let err = reg.register(noop_job("")).await.unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    #[tokio::test]
    async fn unregister_missing_kind_is_not_found() {
        let reg = Registry::new(Bus::new(8));
        let err = reg.unregister("ghost").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn clear_empties_and_signals() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let reg = Registry::new(bus);
        reg.register(noop_job("x")).await.unwrap();
        reg.clear().await;
        assert!(reg.is_empty().await);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::JobRegistered);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::JobUnregistered);
    }
}
