//! # Engine core: queue, workers, pool, and the manager.
//!
//! ## Contents
//! - [`ManagerConfig`] — pool size, poll interval, bus capacity
//! - [`Queue`] — store-facing enqueue/dequeue handle shared by workers
//! - [`Worker`] — one dequeue-execute loop with retry/backoff/timeout
//! - [`WorkerPool`] — start/stop/resize over N workers on one queue
//! - [`Manager`] — top-level API: register, schedule, inspect, cancel
//! - [`shutdown`] — cross-platform termination-signal helper
//!
//! ## Architecture
//! ```text
//! Manager::schedule_*()
//!     └─► Instance (Created → Scheduled) ──► Queue ──► Store
//!
//! WorkerPool
//!   ├─► Worker 0 ─┐
//!   ├─► Worker 1 ─┼─► Queue::dequeue_next() ─► execute ─► transitions
//!   └─► Worker N ─┘                                │
//!                                                  ▼
//!                              Bus ──► SubscriberSet ──► Subscribe impls
//! ```

mod config;
mod manager;
mod pool;
mod queue;
pub mod shutdown;
mod worker;

pub use config::ManagerConfig;
pub use manager::{Manager, ManagerBuilder, ScheduleOptions};
pub use pool::WorkerPool;
pub use queue::Queue;
pub use worker::Worker;
