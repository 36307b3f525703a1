//! # Per-job execution policy.
//!
//! [`Policy`] bundles the retry/timeout/priority configuration attached to a
//! [`Job`](crate::jobs::Job). Individual fields can be overridden per
//! schedule call through
//! [`ScheduleOptions`](crate::core::ScheduleOptions).
//!
//! ## Sentinel values
//! - `max_retries = 0` → no retries
//! - `max_retries < 0` → infinite retries
//! - `timeout = 0s` → unbounded execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::BackoffPolicy;

/// Scheduling precedence with Unix-nice semantics.
///
/// Lower numeric value = higher precedence. Equal priorities break ties by
/// earliest scheduled time at dequeue.
///
/// ## Example
/// ```rust
/// use jobvisor::Priority;
///
/// assert!(Priority::new(-5) < Priority::new(0));
/// assert_eq!(Priority::default(), Priority::new(0));
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Priority(pub i32);

impl Priority {
    /// Creates a priority from a raw nice value.
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw nice value.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Retry/timeout/priority configuration for a job.
#[derive(Clone, Debug)]
pub struct Policy {
    /// Maximum number of retries after the first attempt.
    ///
    /// - `0` = no retries (single attempt)
    /// - `n > 0` = up to `n` retries
    /// - `n < 0` = retry forever
    pub max_retries: i32,

    /// Queue precedence inherited by instances unless overridden at
    /// schedule time.
    pub priority: Priority,

    /// Per-attempt deadline. `Duration::ZERO` = unbounded.
    pub timeout: Duration,

    /// Delay computation between attempts.
    pub backoff: BackoffPolicy,
}

impl Policy {
    /// Returns the per-attempt timeout as an `Option` (`0s` → `None`).
    #[inline]
    pub fn timeout_opt(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Decides whether another attempt may run after `attempt` attempts
    /// have already entered `Processing`.
    ///
    /// Retry is allowed while `attempt <= max_retries`, or always when
    /// `max_retries` is negative (infinite).
    #[inline]
    pub fn should_retry(&self, attempt: u32) -> bool {
        if self.max_retries < 0 {
            return true;
        }
        i64::from(attempt) <= i64::from(self.max_retries)
    }

    /// Returns a new policy with the given retry budget.
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns a new policy with the given priority.
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Returns a new policy with the given per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a new policy with the given backoff.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for Policy {
    /// No retries, priority 0, unbounded execution, default backoff.
    fn default() -> Self {
        Self {
            max_retries: 0,
            priority: Priority::default(),
            timeout: Duration::ZERO,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_budget_counts_attempts() {
        let p = Policy::default().with_max_retries(2);
        // attempt_count is incremented entering Processing; after attempt n
        // fails, retry is allowed while n <= max_retries.
        assert!(p.should_retry(1));
        assert!(p.should_retry(2));
        assert!(!p.should_retry(3));
    }

    #[test]
    fn negative_budget_is_infinite() {
        let p = Policy::default().with_max_retries(-1);
        assert!(p.should_retry(1_000_000));
    }

    #[test]
    fn zero_timeout_is_unbounded() {
        assert_eq!(Policy::default().timeout_opt(), None);
        let p = Policy::default().with_timeout(Duration::from_secs(5));
        assert_eq!(p.timeout_opt(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn priority_orders_like_nice() {
        assert!(Priority::new(-10) < Priority::new(10));
        assert!(Priority::new(0) < Priority::new(5));
    }
}
