//! # Lifecycle states and group masks.
//!
//! [`JobState`] is a closed enum whose variants occupy distinct single bits,
//! and [`StateMask`] is the explicit set type over those bits. Group
//! membership (active, final, error, success) lives in named mask constants
//! rather than numeric overlap tricks, which keeps the state machine
//! auditable and prevents illegal composite states from being constructed
//! outside the defined groups.
//!
//! ## State machine
//! ```text
//! Created → Scheduled → Processing ──► Completed
//!                           │   ▲  └─► Terminated
//!                           │   └────── (retry re-enters Processing)
//!                           ├─────────► TimedOut
//!                           └─────────► Cancelled
//! ```
//!
//! ## Example
//! ```rust
//! use jobvisor::{JobState, StateMask};
//!
//! assert!(JobState::Completed.is(StateMask::FINAL));
//! assert!(JobState::Completed.is(StateMask::SUCCESS));
//! assert!(!JobState::Completed.is(StateMask::ERROR));
//! assert!(JobState::Processing.is(StateMask::ACTIVE));
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle state of an instance. Each variant is a distinct single bit.
#[repr(u16)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// No state recorded yet.
    #[default]
    Unset = 0,
    /// Instance was built; always the first history record.
    Created = 1 << 0,
    /// Instance was enqueued and is awaiting a worker.
    Scheduled = 1 << 1,
    /// A worker is executing an attempt.
    Processing = 1 << 2,
    /// A cancel request was observed; retry suppressed.
    Cancelled = 1 << 3,
    /// The policy deadline fired on the final attempt.
    TimedOut = 1 << 4,
    /// Execution succeeded (or was recovered by `on_error`).
    Completed = 1 << 5,
    /// Retry budget exhausted; final error recorded.
    Terminated = 1 << 6,
}

impl JobState {
    /// Returns the state's bit.
    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Tests membership in a mask via bitwise AND.
    #[inline]
    pub fn is(self, mask: StateMask) -> bool {
        mask.contains(self)
    }

    /// True for states in [`StateMask::FINAL`].
    #[inline]
    pub fn is_final(self) -> bool {
        self.is(StateMask::FINAL)
    }

    /// Short lowercase label for logs and record options.
    pub fn as_label(self) -> &'static str {
        match self {
            JobState::Unset => "unset",
            JobState::Created => "created",
            JobState::Scheduled => "scheduled",
            JobState::Processing => "processing",
            JobState::Cancelled => "cancelled",
            JobState::TimedOut => "timed_out",
            JobState::Completed => "completed",
            JobState::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A set of [`JobState`] bits, used for group queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMask(u16);

impl StateMask {
    /// Empty mask; matches nothing.
    pub const NONE: StateMask = StateMask(0);

    /// States with work still ahead: `Scheduled | Processing`.
    pub const ACTIVE: StateMask =
        StateMask(JobState::Scheduled as u16 | JobState::Processing as u16);

    /// Terminal states: `Cancelled | TimedOut | Completed | Terminated`.
    pub const FINAL: StateMask = StateMask(
        JobState::Cancelled as u16
            | JobState::TimedOut as u16
            | JobState::Completed as u16
            | JobState::Terminated as u16,
    );

    /// Terminal failure states: `Cancelled | TimedOut | Terminated`.
    pub const ERROR: StateMask = StateMask(
        JobState::Cancelled as u16 | JobState::TimedOut as u16 | JobState::Terminated as u16,
    );

    /// Terminal success: `Completed`.
    pub const SUCCESS: StateMask = StateMask(JobState::Completed as u16);

    /// Every defined state.
    pub const ALL: StateMask = StateMask(
        JobState::Created as u16
            | JobState::Scheduled as u16
            | JobState::Processing as u16
            | JobState::Cancelled as u16
            | JobState::TimedOut as u16
            | JobState::Completed as u16
            | JobState::Terminated as u16,
    );

    /// Builds a mask from individual states.
    pub fn of(states: &[JobState]) -> Self {
        let mut bits = 0;
        for s in states {
            bits |= s.bits();
        }
        StateMask(bits)
    }

    /// Tests whether the mask includes `state`.
    #[inline]
    pub fn contains(self, state: JobState) -> bool {
        self.0 & state.bits() != 0
    }

    /// Tests whether two masks intersect.
    #[inline]
    pub fn intersects(self, other: StateMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Union of two masks.
    #[inline]
    pub fn union(self, other: StateMask) -> StateMask {
        StateMask(self.0 | other.0)
    }

    /// Raw bits.
    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }
}

impl From<JobState> for StateMask {
    fn from(state: JobState) -> Self {
        StateMask(state.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [JobState; 7] = [
        JobState::Created,
        JobState::Scheduled,
        JobState::Processing,
        JobState::Cancelled,
        JobState::TimedOut,
        JobState::Completed,
        JobState::Terminated,
    ];

    #[test]
    fn bits_are_distinct() {
        for (i, a) in ALL_STATES.iter().enumerate() {
            for b in &ALL_STATES[i + 1..] {
                assert_eq!(a.bits() & b.bits(), 0, "{a} and {b} overlap");
            }
        }
        assert_eq!(JobState::Unset.bits(), 0);
    }

    #[test]
    fn group_membership_tables() {
        assert!(JobState::Scheduled.is(StateMask::ACTIVE));
        assert!(JobState::Processing.is(StateMask::ACTIVE));
        assert!(!JobState::Completed.is(StateMask::ACTIVE));

        for s in [
            JobState::Cancelled,
            JobState::TimedOut,
            JobState::Completed,
            JobState::Terminated,
        ] {
            assert!(s.is_final(), "{s} should be final");
        }
        assert!(!JobState::Processing.is_final());

        assert!(JobState::Terminated.is(StateMask::ERROR));
        assert!(!JobState::Completed.is(StateMask::ERROR));
        assert!(JobState::Completed.is(StateMask::SUCCESS));

        for s in ALL_STATES {
            assert!(s.is(StateMask::ALL));
        }
        assert!(!JobState::Unset.is(StateMask::ALL));
    }

    #[test]
    fn mask_of_builds_unions() {
        let m = StateMask::of(&[JobState::Created, JobState::Completed]);
        assert!(m.contains(JobState::Created));
        assert!(m.contains(JobState::Completed));
        assert!(!m.contains(JobState::Processing));
        assert!(m.intersects(StateMask::SUCCESS));
    }
}
