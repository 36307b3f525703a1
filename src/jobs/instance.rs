//! # Instances and their append-only audit records.
//!
//! An [`Instance`] is one scheduled/executing occurrence of a job. Its
//! lifecycle is captured as a monotonically appended list of
//! [`StateRecord`]s; free-form log lines are captured as [`LogRecord`]s with
//! a bitmask [`LogLevel`].
//!
//! ## Invariants
//! - exactly one `Created` record exists and is always first;
//! - [`Instance::state`] is the state of the last record (`Unset` before the
//!   first transition is recorded);
//! - `attempt_count` increases only on transition into `Processing`;
//! - terminal instances are never re-enqueued; retry re-enters `Processing`
//!   on the same instance, it does not create a new one. Cron recurrence
//!   schedules a **fresh** instance per occurrence.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::policies::Priority;

use super::state::JobState;

/// Well-known keys of the [`StateRecord::options`] map.
pub mod opt {
    /// Serialized arguments, set on `Created`.
    pub const ARGUMENTS: &str = "arguments";
    /// Serialized results, set on `Completed`.
    pub const RESULTS: &str = "results";
    /// Serialized error, set on `Terminated`/`TimedOut`.
    pub const ERROR: &str = "error";
    /// Error message recovered by `on_error`, set on `Completed`.
    pub const RECOVERED_ERROR: &str = "recovered_error";
}

/// Severity of an instance log line. Each variant is a distinct bit.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug = 1 << 0,
    /// Normal progress.
    Info = 1 << 1,
    /// Something unexpected but recoverable.
    Warn = 1 << 2,
    /// A failure.
    Error = 1 << 3,
}

impl LogLevel {
    /// Returns the level's bit.
    #[inline]
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Tests membership in a mask via bitwise AND.
    #[inline]
    pub fn is(self, mask: LevelMask) -> bool {
        mask.contains(self)
    }

    /// Short lowercase label.
    pub fn as_label(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A set of [`LogLevel`] bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelMask(u8);

impl LevelMask {
    /// Every level.
    pub const ALL: LevelMask = LevelMask(
        LogLevel::Debug as u8 | LogLevel::Info as u8 | LogLevel::Warn as u8 | LogLevel::Error as u8,
    );

    /// Builds a mask from individual levels.
    pub fn of(levels: &[LogLevel]) -> Self {
        let mut bits = 0;
        for l in levels {
            bits |= l.bits();
        }
        LevelMask(bits)
    }

    /// Tests whether the mask includes `level`.
    #[inline]
    pub fn contains(self, level: LogLevel) -> bool {
        self.0 & level.bits() != 0
    }

    /// Raw bits.
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl From<LogLevel> for LevelMask {
    fn from(level: LogLevel) -> Self {
        LevelMask(level.bits())
    }
}

/// Immutable, timestamped snapshot of one state transition.
///
/// Append-only; per-instance ordering is the append order, and cross-instance
/// listings are sorted by timestamp ascending by the `Store`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateRecord {
    /// Instance identity.
    pub uuid: Uuid,
    /// Job kind.
    pub kind: String,
    /// The state entered by this transition.
    pub state: JobState,
    /// Wall-clock append time.
    pub timestamp: DateTime<Utc>,
    /// Free-form metadata; see [`opt`] for well-known keys.
    pub options: BTreeMap<String, Value>,
}

impl StateRecord {
    /// Creates a record for `instance` entering `state` at the current time.
    pub fn now(instance: &Instance, state: JobState) -> Self {
        Self {
            uuid: instance.uuid,
            kind: instance.kind.clone(),
            state,
            timestamp: Utc::now(),
            options: BTreeMap::new(),
        }
    }

    /// Attaches one option entry.
    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }
}

/// Immutable instance log entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogRecord {
    /// Instance identity.
    pub uuid: Uuid,
    /// Job kind.
    pub kind: String,
    /// Severity bit.
    pub level: LogLevel,
    /// Wall-clock append time.
    pub timestamp: DateTime<Utc>,
    /// Free-form message.
    pub message: String,
}

impl LogRecord {
    /// Creates a log record for `instance` at the current time.
    pub fn now(instance: &Instance, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            uuid: instance.uuid,
            kind: instance.kind.clone(),
            level,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

/// One scheduled/executing occurrence of a job.
///
/// Created by `Manager::schedule_*`, mutated only by the owning worker during
/// execution, and terminal once its state enters
/// [`StateMask::FINAL`](super::StateMask::FINAL).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instance {
    /// Globally unique identity, generated at creation.
    pub uuid: Uuid,
    /// Kind of the defining job.
    pub kind: String,
    /// Ordered, loosely-typed invocation arguments.
    pub arguments: Vec<Value>,
    /// Queue precedence (inherited from the policy unless overridden).
    pub priority: Priority,
    /// Retry budget (`0` none, negative infinite).
    pub max_retries: i32,
    /// Per-attempt deadline (`ZERO` = unbounded).
    pub timeout: Duration,
    /// Earliest eligible execution time.
    pub scheduled_at: DateTime<Utc>,
    /// Cron expression driving recurrence, if this occurrence came from one.
    ///
    /// Workers use it to schedule a fresh instance at the next occurrence
    /// once this one reaches a terminal state (cancellation excepted).
    pub cron: Option<String>,
    /// Number of times the instance entered `Processing`.
    pub attempt_count: u32,
    /// Ordered results, present only after success.
    pub results: Option<Vec<Value>>,
    /// Final error message, present only after failure.
    pub error: Option<String>,
    /// Monotonically appended transition history.
    pub state_history: Vec<StateRecord>,
}

impl Instance {
    /// Creates a fresh instance with a new uuid and empty history.
    ///
    /// The caller records the `Created` transition; see
    /// [`Instance::transition`].
    pub fn new(kind: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind: kind.into(),
            arguments,
            priority: Priority::default(),
            max_retries: 0,
            timeout: Duration::ZERO,
            scheduled_at: Utc::now(),
            cron: None,
            attempt_count: 0,
            results: None,
            error: None,
            state_history: Vec::new(),
        }
    }

    /// Current state: the state of the last history record, or
    /// [`JobState::Unset`] before any transition is recorded.
    pub fn state(&self) -> JobState {
        self.state_history
            .last()
            .map(|r| r.state)
            .unwrap_or(JobState::Unset)
    }

    /// True once the instance reached a terminal state.
    pub fn is_final(&self) -> bool {
        self.state().is_final()
    }

    /// Per-attempt timeout as an `Option` (`0s` → `None`).
    pub fn timeout_opt(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Appends a transition record and returns a clone of it.
    ///
    /// Entering `Processing` increments `attempt_count`; no other transition
    /// touches the counter.
    pub fn transition(&mut self, state: JobState, options: BTreeMap<String, Value>) -> StateRecord {
        if state == JobState::Processing {
            self.attempt_count += 1;
        }
        let mut record = StateRecord::now(self, state);
        record.options = options;
        self.state_history.push(record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_is_first_and_state_follows_last() {
        let mut inst = Instance::new("sum", vec![json!(1), json!(2)]);
        assert_eq!(inst.state(), JobState::Unset);

        inst.transition(JobState::Created, BTreeMap::new());
        inst.transition(JobState::Scheduled, BTreeMap::new());
        assert_eq!(inst.state_history[0].state, JobState::Created);
        assert_eq!(inst.state(), JobState::Scheduled);
        assert!(!inst.is_final());

        inst.transition(JobState::Processing, BTreeMap::new());
        inst.transition(JobState::Completed, BTreeMap::new());
        assert_eq!(inst.state(), JobState::Completed);
        assert!(inst.is_final());
    }

    #[test]
    fn attempts_count_only_processing_entries() {
        let mut inst = Instance::new("noop", vec![]);
        inst.transition(JobState::Created, BTreeMap::new());
        inst.transition(JobState::Scheduled, BTreeMap::new());
        assert_eq!(inst.attempt_count, 0);

        inst.transition(JobState::Processing, BTreeMap::new());
        assert_eq!(inst.attempt_count, 1);
        inst.transition(JobState::Processing, BTreeMap::new());
        inst.transition(JobState::Terminated, BTreeMap::new());
        assert_eq!(inst.attempt_count, 2);
    }

    #[test]
    fn level_mask_membership() {
        let errs = LevelMask::of(&[LogLevel::Warn, LogLevel::Error]);
        assert!(LogLevel::Error.is(errs));
        assert!(!LogLevel::Info.is(errs));
        assert!(LogLevel::Debug.is(LevelMask::ALL));
    }
}
