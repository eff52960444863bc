//! Process-level entry point for plugin binaries.
//!
//! [`PluginApp`] owns the one [`PluginServer`] of the process, announces its
//! port on stdout and stops it when a termination signal arrives.

use crate::config::{self, ServerConfig};
use crate::contract::PluginContract;
use crate::error::Result;
use crate::server::PluginServer;
use crate::signal::ShutdownSignals;
use std::future::Future;
use std::process::ExitCode;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

/// A plugin process: one contract, one server, one handshake.
pub struct PluginApp<C> {
    server: PluginServer<C>,
    requested_port: u16,
}

impl<C: PluginContract> PluginApp<C> {
    pub fn new(contract: C) -> Self {
        Self {
            server: PluginServer::new(contract),
            requested_port: ServerConfig::DEFAULT_PORT,
        }
    }

    /// Port to request when `PLUGIN_PORT` is not set.
    pub fn with_port(mut self, port: u16) -> Self {
        self.requested_port = port;
        self
    }

    /// Serve until SIGINT or SIGTERM is received.
    pub async fn run(self) -> Result<()> {
        let signals = ShutdownSignals::install()?;
        self.run_until(signals.recv()).await
    }

    /// Serve until `shutdown` resolves, then stop the server.
    ///
    /// A valid `PLUGIN_PORT` overrides the requested port.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let port = config::resolve_port(self.requested_port);
        self.run_on_port(port, shutdown).await
    }

    /// Serve on exactly `port` until `shutdown` resolves, ignoring `PLUGIN_PORT`.
    pub async fn run_on_port<F>(mut self, port: u16, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let assigned = self.server.start(port).await?;

        announce_port(assigned).await?;
        info!("Plugin ready on port {}", assigned);

        shutdown.await;
        self.server.stop().await;
        Ok(())
    }
}

/// Write the handshake line to stdout and flush it.
async fn announce_port(port: u16) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let line = format!("{}\n", config::handshake_line(port));
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Run a plugin contract as the whole process.
///
/// Returns exit code 0 after a signal-triggered shutdown and 1 when the server
/// could not start.
///
/// ```rust,ignore
/// #[tokio::main]
/// async fn main() -> std::process::ExitCode {
///     plugrpc_sdk::logging::init(false);
///     plugrpc_sdk::serve(MyPlugin).await
/// }
/// ```
pub async fn serve<C: PluginContract>(contract: C) -> ExitCode {
    match PluginApp::new(contract).run().await {
        Ok(()) => {
            info!("Plugin shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Plugin failed to start: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ExecutionRequest;
    use crate::error::PluginError;
    use crate::proto::ExecutionResponse;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    struct Noop;

    #[async_trait]
    impl PluginContract for Noop {
        async fn execute(&self, _request: ExecutionRequest) -> anyhow::Result<ExecutionResponse> {
            Ok(ExecutionResponse::default())
        }
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let (tx, rx) = oneshot::channel::<()>();
        let app = tokio::spawn(
            PluginApp::new(Noop).run_until(async move {
                let _ = rx.await;
            }),
        );

        tx.send(()).unwrap();
        app.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_on_port_reports_bind_failure() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = PluginApp::new(Noop)
            .run_on_port(port, std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Bind { addr, .. } if addr.port() == port));
        assert!(err.is_startup_failure());
    }
}
