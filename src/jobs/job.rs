//! # Job definition: kind + executor + policy + schedule + callbacks.
//!
//! A [`Job`] is the immutable definition behind a kind. It bundles:
//! - the [`Executor`] invoked for each instance,
//! - the default [`Policy`] (retries, priority, timeout, backoff),
//! - the default [`Schedule`],
//! - optional lifecycle callbacks.
//!
//! Jobs are owned by the [`Registry`](super::Registry) for their registered
//! lifetime and are immutable after construction; re-registration of a taken
//! kind is rejected.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Executor, Job, Policy};
//! use std::time::Duration;
//!
//! let job = Job::new("sum", Executor::from_fn2(|a: i64, b: i64| a + b))
//!     .with_description("adds two integers")
//!     .with_policy(Policy::default().with_max_retries(2).with_timeout(Duration::from_secs(5)));
//!
//! assert_eq!(job.kind(), "sum");
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;
use crate::policies::Policy;

use super::executor::Executor;
use super::instance::Instance;
use super::schedule::Schedule;
use super::state::JobState;

/// Callback fired after a successful completion with the ordered results.
pub type ResponseHook = Arc<dyn Fn(&Instance, &[Value]) + Send + Sync>;

/// Callback fired on a failed attempt's final disposition.
///
/// Returning `None` converts the failure into success-equivalent completion;
/// returning `Some(err)` proceeds to retry evaluation with `err`.
pub type ErrorHook = Arc<dyn Fn(&Instance, Error) -> Option<Error> + Send + Sync>;

/// Callback fired on every state transition.
pub type StateHook = Arc<dyn Fn(&Instance, JobState) + Send + Sync>;

/// Immutable definition of a job kind.
///
/// Cheap to clone; executor and callbacks are shared behind `Arc`s.
#[derive(Clone)]
pub struct Job {
    kind: String,
    description: Option<String>,
    executor: Executor,
    policy: Policy,
    schedule: Schedule,
    on_response: Option<ResponseHook>,
    on_error: Option<ErrorHook>,
    on_state_change: Option<StateHook>,
}

impl Job {
    /// Creates a definition with default policy and immediate schedule.
    ///
    /// The kind must be non-empty; emptiness is rejected at registration.
    pub fn new(kind: impl Into<String>, executor: Executor) -> Self {
        Self {
            kind: kind.into(),
            description: None,
            executor,
            policy: Policy::default(),
            schedule: Schedule::default(),
            on_response: None,
            on_error: None,
            on_state_change: None,
        }
    }

    /// The unique kind name.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Optional human-readable description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The executor invoked per instance.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// The default policy inherited by instances.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// The default schedule.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// The completion callback, if any.
    pub fn on_response(&self) -> Option<&ResponseHook> {
        self.on_response.as_ref()
    }

    /// The error callback, if any.
    pub fn on_error(&self) -> Option<&ErrorHook> {
        self.on_error.as_ref()
    }

    /// The state-change callback, if any.
    pub fn on_state_change(&self) -> Option<&StateHook> {
        self.on_state_change.as_ref()
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the policy.
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Sets the completion callback.
    pub fn with_on_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&Instance, &[Value]) + Send + Sync + 'static,
    {
        self.on_response = Some(Arc::new(f));
        self
    }

    /// Sets the error callback.
    ///
    /// A `None` return converts the failure into completion; `Some(err)`
    /// continues into retry evaluation.
    pub fn with_on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Instance, Error) -> Option<Error> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Sets the state-change callback.
    pub fn with_on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&Instance, JobState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("arity", &self.executor.arity())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
