//! # Event subscribers for the jobvisor engine.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`]
//! fan-out, and a built-in [`LogWriter`] that forwards events to `tracing`.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Worker ── publish(Event) ──► Bus ──► Manager listener ──► SubscriberSet
//!                                                                  │
//!                                                     ┌────────────┼───────────┐
//!                                                     ▼            ▼           ▼
//!                                                 LogWriter     Metrics     Custom
//! ```
//!
//! Subscribers are the engine's observability collaborators: counters,
//! dashboards, and alerts plug in here instead of living as process-wide
//! singletons, so tests can substitute a recording implementation.

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
