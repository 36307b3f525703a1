//! # Logging subscriber for debugging and demos.
//!
//! [`LogWriter`] forwards engine events to `tracing` in a compact,
//! human-readable form. Useful for development and examples; production
//! deployments typically implement their own [`Subscribe`] for structured
//! metrics or audit pipelines.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Tracing-backed logging subscriber.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let kind = e.job.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::JobRegistered => info!(kind, "job registered"),
            EventKind::JobUnregistered => info!(kind, "job unregistered"),
            EventKind::InstanceScheduled => {
                info!(kind, uuid = ?e.uuid, "instance scheduled");
            }
            EventKind::InstanceStarted => {
                debug!(kind, uuid = ?e.uuid, attempt = e.attempt, "instance started");
            }
            EventKind::InstanceCompleted => {
                info!(kind, uuid = ?e.uuid, attempt = e.attempt, "instance completed");
            }
            EventKind::InstanceFailed => {
                warn!(kind, uuid = ?e.uuid, attempt = e.attempt, reason = e.reason.as_deref(), "instance failed");
            }
            EventKind::InstanceTimedOut => {
                warn!(kind, uuid = ?e.uuid, attempt = e.attempt, timeout_ms = e.timeout_ms, "instance timed out");
            }
            EventKind::RetryScheduled => {
                info!(kind, uuid = ?e.uuid, after_attempt = e.attempt, delay_ms = e.delay_ms, "retry scheduled");
            }
            EventKind::InstanceCancelled => {
                info!(kind, uuid = ?e.uuid, "instance cancelled");
            }
            EventKind::InstanceTerminated => {
                warn!(kind, uuid = ?e.uuid, attempt = e.attempt, reason = e.reason.as_deref(), "instance terminated");
            }
            EventKind::WorkerStarted => debug!(worker = e.worker, "worker started"),
            EventKind::WorkerStopped => debug!(worker = e.worker, "worker stopped"),
            EventKind::PoolResized => info!(workers = e.workers, "pool resized"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                warn!(subscriber = kind, reason = e.reason.as_deref(), "subscriber issue");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
