//! # Event bus for broadcasting engine events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from multiple sources (manager, registry,
//! workers, pool).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                  Subscriber (one):
//!   Worker 1 ──┐
//!   Worker 2 ──┼──────► Bus ───────► subscriber listener ────► SubscriberSet
//!   Worker N ──┤  (broadcast chan)      (in Manager)
//!   Registry ──┘
//! ```
//!
//! jobvisor uses a single listener (spawned by the `Manager`) that fans out
//! events to user subscribers via [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: a single ring buffer stores recent events.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n`
//!   oldest items.
//! - **No persistence**: events are lost if there are no active receivers at
//!   send time; durable auditing goes through the `Store`, not the bus.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for engine events.
///
/// Thin wrapper over [`tokio::sync::broadcast`] providing a
/// `publish`/`subscribe` API. Multiple publishers can publish concurrently;
/// subscribers receive clones of each event.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers, the event is dropped; the call still
    /// returns immediately.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes subsequent events.
    ///
    /// Each call creates an independent receiver; a receiver only gets events
    /// sent after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::now(EventKind::ShutdownRequested));
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::ShutdownRequested);
    }

    #[tokio::test]
    async fn publish_without_receivers_is_dropped() {
        let bus = Bus::new(1);
        bus.publish(Event::now(EventKind::ShutdownRequested));
        // A receiver created afterwards must not see the earlier event.
        let mut rx = bus.subscribe();
        bus.publish(Event::now(EventKind::PoolResized).with_workers(3));
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::PoolResized);
    }
}
