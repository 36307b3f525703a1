//! Engine events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the manager, registry,
//! workers, and the worker pool.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Manager`, `Registry`, `Worker`, `WorkerPool`.
//! - **Consumers**: `Manager`'s subscriber listener, which fans events out to
//!   the [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! This is the injected observability seam of the engine: metrics, audit, or
//! alerting sit behind [`Subscribe`](crate::subscribers::Subscribe) rather
//! than behind process-wide counters, so tests can substitute a recording
//! implementation.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
