//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each [`Event`](crate::events::Event) to
//! multiple subscribers **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//! - With a diagnostics bus attached, drops and panics also surface as
//!   [`SubscriberOverflow`](crate::events::EventKind::SubscriberOverflow) /
//!   [`SubscriberPanicked`](crate::events::EventKind::SubscriberPanicked)
//!   events. Diagnostic events never report on themselves, so one dropped
//!   event yields at most one follow-up.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow (events are dropped for that
//!   subscriber).
//!
//! ## Diagram
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

use crate::events::{Bus, Event, EventKind};

use super::Subscribe;

/// Per-subscriber channel with metadata
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    diagnostics: Option<Bus>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        Self::build(subs, None)
    }

    /// Like [`SubscriberSet::new`], reporting drops and panics on `bus` as
    /// `SubscriberOverflow` / `SubscriberPanicked` events.
    #[must_use]
    pub fn with_bus(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        Self::build(subs, Some(bus))
    }

    fn build(subs: Vec<Arc<dyn Subscribe>>, diagnostics: Option<Bus>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let s = Arc::clone(&sub);
            let diag = diagnostics.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = s.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        warn!(subscriber = s.name(), ?panic_err, "subscriber panicked");
                        if let Some(bus) = &diag {
                            if !is_diagnostic(ev.kind) {
                                bus.publish(Event::subscriber_panicked(
                                    s.name(),
                                    format!("{panic_err:?}"),
                                ));
                            }
                        }
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }

        Self {
            channels,
            workers,
            diagnostics,
        }
    }

    /// Fan-out one event to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is **full** or **closed**, the event is dropped
    /// for it, a warning is logged, and (with a diagnostics bus attached) a
    /// `SubscriberOverflow` event is published.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = channel.name, "dropped event: queue full");
                    self.report_overflow(channel.name, "queue full", ev.kind);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(subscriber = channel.name, "dropped event: worker closed");
                    self.report_overflow(channel.name, "worker closed", ev.kind);
                }
            }
        }
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    fn report_overflow(&self, name: &'static str, reason: &'static str, dropped: EventKind) {
        if let Some(bus) = &self.diagnostics {
            if !is_diagnostic(dropped) {
                bus.publish(Event::subscriber_overflow(name, reason));
            }
        }
    }
}

/// True for the kinds the set itself publishes.
fn is_diagnostic(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Subscribe for Sleepy {
        async fn on_event(&self, _event: &Event) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        fn name(&self) -> &'static str {
            "sleepy"
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _event: &Event) {
            panic!("kaboom");
        }
        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    async fn next_of_kind(
        rx: &mut tokio::sync::broadcast::Receiver<Event>,
        kind: EventKind,
    ) -> Event {
        loop {
            let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("diagnostic event within deadline")
                .expect("bus open");
            if ev.kind == kind {
                return ev;
            }
        }
    }

    #[tokio::test]
    async fn emit_reaches_every_subscriber() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let set = SubscriberSet::new(vec![
            Arc::new(Counter(a.clone())) as Arc<dyn Subscribe>,
            Arc::new(Counter(b.clone())) as Arc<dyn Subscribe>,
        ]);

        set.emit(&Event::now(EventKind::InstanceScheduled));
        set.emit(&Event::now(EventKind::InstanceCompleted));
        set.shutdown().await;

        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn overflow_is_published_on_the_bus() {
        let bus = Bus::new(32);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::with_bus(vec![Arc::new(Sleepy) as Arc<dyn Subscribe>], bus);

        // Capacity 1 and a stalled worker: some of these must drop.
        for _ in 0..4 {
            set.emit(&Event::now(EventKind::InstanceScheduled));
        }

        let ev = next_of_kind(&mut rx, EventKind::SubscriberOverflow).await;
        assert_eq!(ev.job.as_deref(), Some("sleepy"));
        assert_eq!(ev.reason.as_deref(), Some("queue full"));
    }

    #[tokio::test]
    async fn panic_is_published_on_the_bus() {
        let bus = Bus::new(32);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::with_bus(vec![Arc::new(Panicky) as Arc<dyn Subscribe>], bus);

        set.emit(&Event::now(EventKind::InstanceScheduled));

        let ev = next_of_kind(&mut rx, EventKind::SubscriberPanicked).await;
        assert_eq!(ev.job.as_deref(), Some("panicky"));
        assert!(ev.reason.as_deref().is_some());
        set.shutdown().await;
    }
}
