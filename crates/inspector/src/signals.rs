//! Signal handling for graceful shutdown.
//!
//! The first SIGINT/SIGTERM (Ctrl+C on Windows) starts a graceful stop of
//! the relay; a second one exits immediately.

use tokio::signal;
use tracing::{error, info, warn};

/// Waits for a termination signal.
///
/// # Platform Support
///
/// * **Unix platforms**: Handles SIGINT and SIGTERM signals
/// * **Windows**: Handles Ctrl+C signal
///
/// # Returns
///
/// `Ok(())` once a signal arrived, or an error if the signal handlers could
/// not be installed. The relay tracks its own shutdown flags from `stop`.
pub async fn setup_signal_handlers() -> Result<(), Box<dyn std::error::Error>> {
    setup_signal_handlers_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

/// Waits for a termination signal without logging.
pub async fn setup_signal_handlers_silent() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}

/// Exits the process on the next termination signal.
///
/// Installed once the graceful stop has begun, so a stuck shutdown can be
/// cut short.
pub fn spawn_forced_exit_handler() {
    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers_silent().await {
            error!("Failed to set up forced shutdown signal handler: {e}");
            return;
        }

        warn!("Shutdown signal received again - exiting immediately");
        std::process::exit(1);
    });
}
