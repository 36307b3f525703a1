//! # Composed predicate over instances, state records, and logs.
//!
//! [`Query`] combines a time [`Filter`] with optional exact-match uuid and
//! kind criteria, a state mask (bitmask containment, not equality), and a
//! log-level mask.
//!
//! ## Structural matching
//! A query is not polymorphic across unrelated shapes: a state criterion only
//! applies to things that carry a state, a level criterion only to things
//! that carry a level. Setting a criterion the target type does not have
//! yields no match for that type.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Query, StateMask};
//!
//! let q = Query::unset().with_states(StateMask::SUCCESS);
//! // matches only instances/state-records whose state intersects Completed
//! ```

use uuid::Uuid;

use crate::jobs::{Instance, LevelMask, LogRecord, StateMask, StateRecord};

use super::Filter;

/// Predicate over instances, state records, and log records.
///
/// An unset query (no criteria) matches everything.
#[derive(Clone, Debug, Default)]
pub struct Query {
    /// Time window applied to the target's timestamp.
    pub filter: Filter,
    /// Exact-match instance uuid.
    pub uuid: Option<Uuid>,
    /// Exact-match job kind.
    pub kind: Option<String>,
    /// State containment mask (state records and instances only).
    pub states: Option<StateMask>,
    /// Level containment mask (log records only).
    pub levels: Option<LevelMask>,
}

impl Query {
    /// A query with no criteria; matches everything.
    pub fn unset() -> Self {
        Self::default()
    }

    /// Sets the time window.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the exact-match uuid.
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    /// Sets the exact-match kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Sets the state containment mask.
    pub fn with_states(mut self, states: impl Into<StateMask>) -> Self {
        self.states = Some(states.into());
        self
    }

    /// Sets the level containment mask.
    pub fn with_levels(mut self, levels: impl Into<LevelMask>) -> Self {
        self.levels = Some(levels.into());
        self
    }

    /// Matches an instance.
    ///
    /// The time window applies to the instance's last transition timestamp
    /// (its scheduled time before any transition is recorded). A level
    /// criterion never matches an instance.
    pub fn matches_instance(&self, instance: &Instance) -> bool {
        if self.levels.is_some() {
            return false;
        }
        let at = instance
            .state_history
            .last()
            .map(|r| r.timestamp)
            .unwrap_or(instance.scheduled_at);
        if !self.filter.matches(at) {
            return false;
        }
        if let Some(uuid) = self.uuid {
            if instance.uuid != uuid {
                return false;
            }
        }
        if let Some(kind) = &self.kind {
            if instance.kind != *kind {
                return false;
            }
        }
        if let Some(states) = self.states {
            if !instance.state().is(states) {
                return false;
            }
        }
        true
    }

    /// Matches a state record. A level criterion never matches one.
    pub fn matches_state(&self, record: &StateRecord) -> bool {
        if self.levels.is_some() {
            return false;
        }
        if !self.filter.matches(record.timestamp) {
            return false;
        }
        if let Some(uuid) = self.uuid {
            if record.uuid != uuid {
                return false;
            }
        }
        if let Some(kind) = &self.kind {
            if record.kind != *kind {
                return false;
            }
        }
        if let Some(states) = self.states {
            if !record.state.is(states) {
                return false;
            }
        }
        true
    }

    /// Matches a log record. A state criterion never matches one.
    pub fn matches_log(&self, record: &LogRecord) -> bool {
        if self.states.is_some() {
            return false;
        }
        if !self.filter.matches(record.timestamp) {
            return false;
        }
        if let Some(uuid) = self.uuid {
            if record.uuid != uuid {
                return false;
            }
        }
        if let Some(kind) = &self.kind {
            if record.kind != *kind {
                return false;
            }
        }
        if let Some(levels) = self.levels {
            if !record.level.is(levels) {
                return false;
            }
        }
        true
    }
}
