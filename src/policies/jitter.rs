//! # Jitter applied to attempt-indexed retry delays.
//!
//! [`JitterPolicy`] randomizes the delay that
//! [`BackoffPolicy::delay_for`](super::BackoffPolicy::delay_for) computed
//! from the attempt number, so instances that failed together do not retry
//! together.
//!
//! Every variant is a pure function of `(base, floor, cap)`: the backoff
//! already derives `base` from the attempt number alone, so jitter output
//! never feeds back into later delays.

use std::time::Duration;

use rand::Rng;

/// Randomization applied on top of the attempt-indexed base delay.
///
/// `floor` and `cap` in [`JitterPolicy::apply`] are the backoff's `first`
/// and `max`; only `Decorrelated` reads them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact base delay, no randomization.
    #[default]
    None,

    /// Uniform in `[0, base]`. Maximum spread, may retry immediately.
    Full,

    /// Uniform in `[base/2, base]`: spreads load while keeping at least half
    /// the intended wait.
    Equal,

    /// Uniform in `[floor, min(base × 3, cap)]`: widens aggressively with the
    /// attempt number while staying inside the backoff's bounds.
    Decorrelated,
}

impl JitterPolicy {
    /// Randomizes `base`, the delay computed for the current attempt.
    pub fn apply(self, base: Duration, floor: Duration, cap: Duration) -> Duration {
        let base_ms = base.as_millis() as u64;
        match self {
            JitterPolicy::None => base,
            JitterPolicy::Full => Duration::from_millis(uniform_to(base_ms)),
            JitterPolicy::Equal => {
                let half = base_ms / 2;
                Duration::from_millis(half + uniform_to(base_ms - half))
            }
            JitterPolicy::Decorrelated => {
                let floor_ms = floor.as_millis() as u64;
                let upper = base_ms
                    .saturating_mul(3)
                    .min(cap.as_millis() as u64)
                    .max(floor_ms);
                if floor_ms >= upper {
                    return floor;
                }
                Duration::from_millis(rand::rng().random_range(floor_ms..=upper))
            }
        }
    }
}

/// Uniform draw from `[0, upper]`.
fn uniform_to(upper: u64) -> u64 {
    if upper == 0 {
        0
    } else {
        rand::rng().random_range(0..=upper)
    }
}
