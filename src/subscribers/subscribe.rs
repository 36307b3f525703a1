//! # The subscriber extension point.
//!
//! Implement [`Subscribe`] to observe engine events: each implementation gets
//! its own worker task and bounded queue inside the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet), so a slow subscriber
//! (I/O, batching) never blocks publishers or its peers. When the queue
//! fills, events for that subscriber are dropped, with a warning and a
//! `SubscriberOverflow` event on the bus.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::InstanceFailed {
//!             // increment failure counter...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// An event consumer driven by its own worker task.
///
/// Avoid blocking the runtime inside `on_event`; use async I/O and
/// cooperative waits.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in warnings and diagnostic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue; events beyond it are dropped.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
