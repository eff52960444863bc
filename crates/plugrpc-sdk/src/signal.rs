//! Termination signal handling for plugin processes.
//!
//! Handlers are installed eagerly so a signal sent right after the handshake
//! line is queued instead of killing the process with the default action.

use std::io;
use tracing::{info, warn};

/// Installed SIGINT/SIGTERM listeners.
///
/// On non-Unix platforms only Ctrl-C is observed.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Register the signal handlers. Must be called inside a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first termination signal.
    #[cfg(unix)]
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => info!("Received interrupt signal"),
            _ = self.terminate.recv() => info!("Received terminate signal"),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received interrupt signal"),
            Err(e) => {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Resolve once the process receives SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    match ShutdownSignals::install() {
        Ok(signals) => signals.recv().await,
        Err(e) => {
            warn!("Failed to install signal handlers: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
