//! # Job definitions, instances, and the dynamic executor.
//!
//! This module provides the core job-related types:
//! - [`Job`] - immutable kind definition: executor + policy + schedule + callbacks
//! - [`Executor`] - dynamic-argument dispatch with arity and coercion checks
//! - [`JobState`] / [`StateMask`] - bit-flag lifecycle states and group masks
//! - [`Instance`] - one scheduled/executing occurrence of a job
//! - [`StateRecord`] / [`LogRecord`] - append-only audit records
//! - [`Schedule`] - fixed-instant or cron-based next-run computation
//! - [`Registry`] - kind → job map

mod executor;
mod instance;
mod job;
mod registry;
mod schedule;
mod state;

pub use executor::{ArgKind, ExecFn, ExecFuture, Executor, FromValue, IntoValues};
pub use instance::{opt, Instance, LevelMask, LogLevel, LogRecord, StateRecord};
pub use job::{ErrorHook, Job, ResponseHook, StateHook};
pub use registry::Registry;
pub use schedule::Schedule;
pub use state::{JobState, StateMask};
