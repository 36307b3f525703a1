//! Retry, timeout, and priority policies.
//!
//! This module groups the knobs that control **how often** a failed instance
//! is retried, **how long** to wait between attempts, and **where** an
//! instance sits in the queue order.
//!
//! ## Contents
//! - [`Policy`] per-job retry count, priority, and timeout bundle
//! - [`Priority`] total-ordered scalar (lower value = higher precedence)
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization strategy to avoid thundering herd
//!
//! ## Quick wiring
//! ```text
//! Job { policy: Policy { max_retries, priority, timeout, backoff } }
//!      └─► core::worker::Worker uses:
//!           - max_retries to decide retry/terminate
//!           - timeout as the per-attempt deadline
//!           - backoff.delay_for(attempt) to schedule the next attempt
//!      └─► core::queue dequeue order: (priority asc, scheduled_at asc)
//! ```
//!
//! ## Defaults
//! - `Policy::default()` → no retries, priority 0, no timeout.
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=30s, jitter=None.

mod backoff;
mod jitter;
mod policy;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use policy::{Policy, Priority};
