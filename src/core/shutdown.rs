//! # Termination-signal helper.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives a
//! termination signal, so [`Manager::run_until_shutdown`](super::Manager)
//! can drain the pool before exiting.
//!
//! On Unix this listens for `SIGINT`, `SIGTERM`, and `SIGQUIT`; elsewhere it
//! falls back to [`tokio::signal::ctrl_c`].

/// Waits for a termination signal.
///
/// Each call installs independent listeners. Returns `Err` only when signal
/// registration itself fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal (Ctrl-C on non-Unix platforms).
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
