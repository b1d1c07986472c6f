//! OS signal helpers for the shutdown path.
//!
//! [`wait_for_shutdown_signal`] completes on the first termination signal:
//! SIGINT, SIGTERM or SIGQUIT on unix (plus ctrl-c), ctrl-c elsewhere.

#[cfg(unix)]
use tokio::signal::unix::SignalKind;

/// Signals treated as a shutdown request by default.
#[cfg(unix)]
#[must_use]
pub fn default_shutdown_signals() -> Vec<SignalKind> {
    vec![
        SignalKind::interrupt(),
        SignalKind::terminate(),
        SignalKind::quit(),
    ]
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// # Errors
///
/// Returns `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::signal;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// # Errors
///
/// Returns `Err` if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
