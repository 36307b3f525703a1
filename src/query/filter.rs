//! # Time-window filter.
//!
//! [`Filter`] expresses an optional half-open window over timestamps:
//! `after <= t < before`. Either bound may be absent; an unset filter
//! matches every timestamp.

use chrono::{DateTime, Utc};

/// Optional half-open time window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    /// Exclusive upper bound.
    pub before: Option<DateTime<Utc>>,
    /// Inclusive lower bound.
    pub after: Option<DateTime<Utc>>,
}

impl Filter {
    /// A filter with no bounds; matches everything.
    pub fn unset() -> Self {
        Self::default()
    }

    /// Sets the exclusive upper bound.
    pub fn with_before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    /// Sets the inclusive lower bound.
    pub fn with_after(mut self, after: DateTime<Utc>) -> Self {
        self.after = Some(after);
        self
    }

    /// True when both bounds are absent.
    pub fn is_unset(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }

    /// Tests a timestamp against the window.
    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        if let Some(before) = self.before {
            if t >= before {
                return false;
            }
        }
        if let Some(after) = self.after {
            if t < after {
                return false;
            }
        }
        true
    }
}
