//! # Backoff policy for retrying instances.
//!
//! [`BackoffPolicy`] controls how retry delays grow after repeated failures.
//! It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay after attempt `n` (1-based) is computed as
//! `first × factor^(n-1)`, clamped to `max`, then jitter is applied. Because
//! the base delay is derived purely from the attempt number, jitter output
//! never feeds back into subsequent calculations — this prevents the negative
//! feedback loop that causes delays to shrink over time.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use jobvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! // After attempt 1 — uses 'first' (100ms)
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
//!
//! // After attempt 2 — first × factor = 200ms
//! assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
//!
//! // After attempt 11 — 100ms × 2^10 = 102_400ms → capped at max=10s
//! assert_eq!(backoff.delay_for(11), Duration::from_secs(10));
//! ```

use std::time::Duration;

use super::jitter::JitterPolicy;

/// Retry backoff policy: function of attempt count → wait duration.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Initial delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap for retries.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy to prevent thundering herd.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a strategy with:
    /// - `first = 100ms`
    /// - `factor = 2.0` (doubling)
    /// - `max = 30s`
    /// - `jitter = None`
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Constant delay with no growth and no jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the wait before the retry that follows attempt `attempt`
    /// (1-based: the first retry waits `first`).
    ///
    /// The base delay is `first × factor^(attempt-1)`, clamped to `max`;
    /// jitter is applied last.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.base_delay(attempt), self.first, self.max)
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let factor = if self.factor < 1.0 { 1.0 } else { self.factor };
        let first_ms = self.first.as_millis() as f64;
        let max_ms = self.max.as_millis() as f64;

        let raw = first_ms * factor.powi(exp as i32);
        let clamped = raw.min(max_ms).max(0.0);
        Duration::from_millis(clamped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_geometrically_and_clamps() {
        let b = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(b.delay_for(1), Duration::from_millis(100));
        assert_eq!(b.delay_for(2), Duration::from_millis(200));
        assert_eq!(b.delay_for(3), Duration::from_millis(400));
        assert_eq!(b.delay_for(10), Duration::from_secs(1));
    }

    #[test]
    fn fixed_never_grows() {
        let b = BackoffPolicy::fixed(Duration::from_millis(50));
        assert_eq!(b.delay_for(1), Duration::from_millis(50));
        assert_eq!(b.delay_for(20), Duration::from_millis(50));
    }

    #[test]
    fn factor_below_one_is_treated_as_constant() {
        let b = BackoffPolicy {
            first: Duration::from_millis(80),
            max: Duration::from_secs(5),
            factor: 0.5,
            jitter: JitterPolicy::None,
        };
        assert_eq!(b.delay_for(5), Duration::from_millis(80));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let b = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::Full,
        };
        for attempt in 1..=8 {
            let d = b.delay_for(attempt);
            assert!(d <= Duration::from_secs(1));
        }
    }
}
