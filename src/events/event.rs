//! # Lifecycle events emitted by the engine.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Registry events**: kind registration changes (the externally observed
//!   registered-count signal)
//! - **Instance lifecycle**: scheduling and execution flow of one instance
//! - **Pool events**: worker and pool membership changes
//! - **Subscriber events**: fan-out overflow/panic diagnostics
//!
//! The [`Event`] struct carries optional metadata such as the job kind,
//! instance uuid, attempt counter, delays, and failure reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::InstanceFailed)
//!     .with_kind("resize-image")
//!     .with_reason("decode error")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.kind, EventKind::InstanceFailed);
//! assert_eq!(ev.job.as_deref(), Some("resize-image"));
//! assert_eq!(ev.attempt, Some(3));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::jobs::JobState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Registry events ===
    /// A job kind was registered.
    ///
    /// Sets: `job`, `at`, `seq`.
    JobRegistered,

    /// A job kind was unregistered.
    ///
    /// Sets: `job`, `at`, `seq`.
    JobUnregistered,

    // === Instance lifecycle events ===
    /// An instance was built and enqueued.
    ///
    /// Sets: `job`, `uuid`, `at`, `seq`.
    InstanceScheduled,

    /// A worker transitioned an instance into `Processing`.
    ///
    /// Sets: `job`, `uuid`, `attempt`, `at`, `seq`.
    InstanceStarted,

    /// An instance completed successfully (or was recovered by `on_error`).
    ///
    /// Sets: `job`, `uuid`, `attempt`, `at`, `seq`.
    InstanceCompleted,

    /// One attempt failed with a retryable or final error.
    ///
    /// Sets: `job`, `uuid`, `attempt`, `reason`, `at`, `seq`.
    InstanceFailed,

    /// One attempt exceeded the policy timeout.
    ///
    /// Sets: `job`, `uuid`, `attempt`, `timeout_ms`, `at`, `seq`.
    InstanceTimedOut,

    /// A retry was scheduled after a failed attempt.
    ///
    /// Sets: `job`, `uuid`, `attempt` (the failed one), `delay_ms`,
    /// `reason`, `at`, `seq`.
    RetryScheduled,

    /// An instance observed a cancel request and stopped.
    ///
    /// Sets: `job`, `uuid`, `at`, `seq`.
    InstanceCancelled,

    /// An instance exhausted its retry budget and terminated.
    ///
    /// Sets: `job`, `uuid`, `attempt`, `reason`, `state`, `at`, `seq`.
    InstanceTerminated,

    // === Pool events ===
    /// A worker entered its dequeue loop.
    ///
    /// Sets: `worker`, `at`, `seq`.
    WorkerStarted,

    /// A worker exited its dequeue loop.
    ///
    /// Sets: `worker`, `at`, `seq`.
    WorkerStopped,

    /// The pool was resized.
    ///
    /// Sets: `workers` (new size), `at`, `seq`.
    PoolResized,

    /// Shutdown was requested (signal observed or `stop` called).
    ///
    /// Sets: `at`, `seq`.
    ShutdownRequested,

    // === Subscriber events ===
    /// A subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `job` (subscriber name), `reason`, `at`, `seq`.
    SubscriberOverflow,

    /// A subscriber panicked during event processing.
    ///
    /// Sets: `job` (subscriber name), `reason`, `at`, `seq`.
    SubscriberPanicked,
}

/// Engine event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: DateTime<Utc>,
    /// Event classification.
    pub kind: EventKind,

    /// Job kind (or subscriber name for subscriber events).
    pub job: Option<Arc<str>>,
    /// Instance uuid, if applicable.
    pub uuid: Option<Uuid>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Configured attempt timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Backoff delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Terminal state, for `InstanceTerminated`.
    pub state: Option<JobState>,
    /// Worker id, for pool events.
    pub worker: Option<usize>,
    /// New pool size, for `PoolResized`.
    pub workers: Option<usize>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: Utc::now(),
            kind,
            job: None,
            uuid: None,
            attempt: None,
            timeout_ms: None,
            delay_ms: None,
            state: None,
            worker: None,
            workers: None,
            reason: None,
        }
    }

    /// Attaches a job kind (or subscriber name).
    #[inline]
    pub fn with_kind(mut self, kind: impl Into<Arc<str>>) -> Self {
        self.job = Some(kind.into());
        self
    }

    /// Attaches an instance uuid.
    #[inline]
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a terminal state.
    #[inline]
    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, id: usize) -> Self {
        self.worker = Some(id);
        self
    }

    /// Attaches a new pool size.
    #[inline]
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_kind(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_kind(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::now(EventKind::InstanceScheduled);
        let b = Event::now(EventKind::InstanceStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_attach_metadata() {
        let id = Uuid::new_v4();
        let ev = Event::now(EventKind::RetryScheduled)
            .with_kind("sum")
            .with_uuid(id)
            .with_attempt(2)
            .with_delay(Duration::from_millis(250));
        assert_eq!(ev.job.as_deref(), Some("sum"));
        assert_eq!(ev.uuid, Some(id));
        assert_eq!(ev.attempt, Some(2));
        assert_eq!(ev.delay_ms, Some(250));
    }
}
