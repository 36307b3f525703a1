//! # Next-run computation: fixed instant or recurring cron cadence.
//!
//! [`Schedule`] decides when an instance becomes eligible:
//! - [`Schedule::immediate`] / [`Schedule::at`] — a fixed instant (default:
//!   now);
//! - [`Schedule::cron`] — the next occurrence strictly after now per
//!   standard 5-field cron semantics.
//!
//! Parsing an invalid cron expression fails at **construction** time
//! ([`Error::Invalid`]), never at [`Schedule::next`] time.
//!
//! ## Example
//! ```rust
//! use jobvisor::Schedule;
//!
//! // Every five minutes, standard 5-field form.
//! let s = Schedule::cron("*/5 * * * *").unwrap();
//! assert!(s.next().is_some());
//!
//! // Malformed expressions are rejected up front.
//! assert!(Schedule::cron("not a cron").is_err());
//! ```

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::Error;

/// Computes the next eligible run time for an instance.
#[derive(Clone, Debug)]
pub enum Schedule {
    /// Run at (or after) a fixed instant.
    At(DateTime<Utc>),
    /// Run on a recurring cron cadence.
    Cron {
        /// Source expression as given to [`Schedule::cron`]; carried onto
        /// scheduled instances so workers can re-derive the next occurrence.
        expr: String,
        /// Parsed form.
        schedule: Box<cron::Schedule>,
    },
}

impl Schedule {
    /// Immediate schedule: eligible as of now.
    pub fn immediate() -> Self {
        Schedule::At(Utc::now())
    }

    /// Fixed-instant schedule.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Schedule::At(instant)
    }

    /// Parses a cron expression.
    ///
    /// Standard 5-field expressions (`min hour dom mon dow`) are accepted and
    /// normalized by prefixing a seconds field; 6- and 7-field forms pass
    /// through unchanged. Malformed input fails here with
    /// [`Error::Invalid`].
    pub fn cron(expr: &str) -> Result<Self, Error> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid("cron expression cannot be empty"));
        }

        let fields = trimmed.split_whitespace().count();
        let normalized = if fields == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };

        let schedule = cron::Schedule::from_str(&normalized)
            .map_err(|e| Error::invalid(format!("bad cron expression {trimmed:?}: {e}")))?;
        Ok(Schedule::Cron {
            expr: trimmed.to_string(),
            schedule: Box::new(schedule),
        })
    }

    /// The cron source expression, or `None` for fixed-instant schedules.
    pub fn cron_expr(&self) -> Option<&str> {
        match self {
            Schedule::At(_) => None,
            Schedule::Cron { expr, .. } => Some(expr),
        }
    }

    /// Returns the next eligible instant.
    ///
    /// For a fixed schedule this is the configured instant (possibly in the
    /// past, i.e. immediately eligible). For cron it is the next occurrence
    /// strictly after now; `None` when the expression has no upcoming
    /// occurrence.
    pub fn next(&self) -> Option<DateTime<Utc>> {
        self.next_after(Utc::now())
    }

    /// Like [`Schedule::next`], relative to an explicit `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::At(instant) => Some(*instant),
            Schedule::Cron { schedule, .. } => schedule.after(&now).next(),
        }
    }
}

impl Default for Schedule {
    /// Immediate.
    fn default() -> Self {
        Schedule::immediate()
    }
}
