//! Error types used by the jobvisor engine.
//!
//! A single [`Error`] enum covers the whole engine surface:
//!
//! - registration failures (`NotFound`, `AlreadyExists`),
//! - invocation failures (`Argument`, `Execution`, `Timeout`),
//! - malformed options (`Invalid`) and resize contention (`Busy`).
//!
//! The enum provides [`Error::as_label`] for logs/metrics and
//! [`Error::is_retryable`] for the worker retry decision.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the engine.
///
/// Registry and queue errors propagate synchronously to the caller of
/// `register`/`schedule_*`. Errors raised while a worker executes an instance
/// never propagate to the scheduling caller; they are resolved locally into a
/// state transition and surface only through history, logs, and callbacks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// A referenced kind or instance does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up (kind name, instance uuid).
        what: String,
    },

    /// A job kind is already registered.
    #[error("already exists: {what}")]
    AlreadyExists {
        /// The kind that is already taken.
        what: String,
    },

    /// Arity or irreconcilable type mismatch at invocation.
    ///
    /// Raised before the callable runs; no side effect of invocation has
    /// happened when this surfaces.
    #[error("argument {position}: expected {expected}, got {actual}")]
    Argument {
        /// Zero-based argument position (or argument count for arity errors).
        position: usize,
        /// Declared parameter type (or expected count).
        expected: String,
        /// Supplied value type (or actual count).
        actual: String,
    },

    /// Malformed option, e.g. a bad cron expression or an empty kind.
    #[error("invalid: {reason}")]
    Invalid {
        /// Human-readable reason.
        reason: String,
    },

    /// The policy deadline was exceeded during execution.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The configured timeout that was exceeded.
        timeout: Duration,
    },

    /// A resize is already in progress; the new request fails immediately.
    #[error("resize already in progress")]
    Busy,

    /// The callable returned a failure.
    #[error("execution failed: {error}")]
    Execution {
        /// The underlying error message.
        error: String,
    },
}

impl Error {
    /// Shorthand for an [`Error::Execution`] from any displayable error.
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Error::Execution {
            error: err.to_string(),
        }
    }

    /// Shorthand for an [`Error::Invalid`] with the given reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Error::Invalid {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::AlreadyExists { .. } => "already_exists",
            Error::Argument { .. } => "argument_error",
            Error::Invalid { .. } => "invalid",
            Error::Timeout { .. } => "timeout",
            Error::Busy => "busy",
            Error::Execution { .. } => "execution_error",
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `true` for [`Error::Execution`] and [`Error::Timeout`]; these
    /// are failures of one attempt, not of the request itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Execution { .. } | Error::Timeout { .. })
    }

    /// Returns `true` for [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            Error::NotFound {
                what: "x".to_string()
            }
            .as_label(),
            "not_found"
        );
        assert_eq!(Error::Busy.as_label(), "busy");
        assert_eq!(
            Error::Timeout {
                timeout: Duration::from_secs(1)
            }
            .as_label(),
            "timeout"
        );
    }

    #[test]
    fn retryability() {
        assert!(Error::execution("boom").is_retryable());
        assert!(Error::Timeout {
            timeout: Duration::from_secs(1)
        }
        .is_retryable());
        assert!(!Error::invalid("bad cron").is_retryable());
        assert!(!Error::Busy.is_retryable());
    }
}
