//! # Engine configuration.

use std::time::Duration;

/// Tunables for the [`Manager`](super::Manager) and its pool.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Initial number of workers.
    ///
    /// Must be at least 1; the pool rejects a resize to zero.
    pub workers: usize,

    /// How long an idle worker sleeps between empty-queue polls.
    pub poll_interval: Duration,

    /// Capacity of the broadcast event bus.
    ///
    /// Slow bus readers miss (lag) rather than block publishers.
    pub bus_capacity: usize,
}

impl Default for ManagerConfig {
    /// 4 workers, 50 ms poll interval, 1024-slot bus.
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_millis(50),
            bus_capacity: 1024,
        }
    }
}
