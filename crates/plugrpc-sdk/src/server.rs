//! gRPC server lifecycle for a plugin process.
//!
//! Binds `127.0.0.1` (OS-assigned port when asked for port 0), serves the
//! `Plugin` service over plaintext HTTP/2 and stops by force: in-flight calls
//! are abandoned rather than drained.
//!
//! ```text
//! Created --bind--> Bound --serve--> Running --stop--> Stopped
//!    \________________________start______/
//! ```
//!
//! # Thread Safety
//!
//! The server runs on the tokio runtime. tonic spawns a task per connection
//! and calls into the shared [`RequestDispatcher`], which holds no mutable
//! state of its own.

use crate::config::ServerConfig;
use crate::contract::PluginContract;
use crate::dispatcher::RequestDispatcher;
use crate::error::{PluginError, Result};
use crate::proto::plugin_server::PluginServer as GrpcPluginServer;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{debug, error, info};

/// Observable lifecycle state of a [`PluginServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Bound,
    Running,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Created => "created",
            ServerState::Bound => "bound",
            ServerState::Running => "running",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Owns the transport for one plugin contract.
pub struct PluginServer<C> {
    contract: Arc<C>,
    state: ServerState,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    cancel: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl<C: PluginContract> PluginServer<C> {
    pub fn new(contract: C) -> Self {
        Self::with_shared(Arc::new(contract))
    }

    /// Create a server around a contract that is also used elsewhere.
    pub fn with_shared(contract: Arc<C>) -> Self {
        Self {
            contract,
            state: ServerState::Created,
            listener: None,
            local_addr: None,
            cancel: CancellationToken::new(),
            task_handle: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Address the server is bound to, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Port the server is bound to, once bound.
    pub fn port(&self) -> Option<u16> {
        self.local_addr.map(|addr| addr.port())
    }

    /// Bind the loopback listener. Port 0 lets the OS choose.
    pub async fn bind(&mut self, port: u16) -> Result<SocketAddr> {
        self.expect_state(ServerState::Created, "bind")?;

        let addr = SocketAddr::new(ServerConfig::HOST.into(), port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| PluginError::Bind { addr, source })?;
        let actual_addr = listener
            .local_addr()
            .map_err(|source| PluginError::Bind { addr, source })?;

        debug!("Plugin server bound to {}", actual_addr);

        self.listener = Some(listener);
        self.local_addr = Some(actual_addr);
        self.state = ServerState::Bound;
        Ok(actual_addr)
    }

    /// Start serving on the bound listener in a background task.
    pub fn serve(&mut self) -> Result<()> {
        self.expect_state(ServerState::Bound, "serve")?;
        let listener = self.listener.take().ok_or_else(|| PluginError::InvalidState {
            operation: "serve",
            state: "bound without a listener".to_string(),
        })?;

        let dispatcher = RequestDispatcher::new(self.contract.clone(), self.cancel.clone());
        let shutdown = self.cancel.clone();
        let incoming = TcpListenerStream::new(listener);

        self.task_handle = Some(tokio::spawn(async move {
            let result = Server::builder()
                .add_service(GrpcPluginServer::new(dispatcher))
                .serve_with_incoming_shutdown(incoming, async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                error!("Plugin server error: {}", e);
            }
        }));

        self.state = ServerState::Running;
        if let Some(addr) = self.local_addr {
            info!("Plugin server listening on {}", addr);
        }
        Ok(())
    }

    /// Bind and serve in one step, returning the port actually bound.
    pub async fn start(&mut self, port: u16) -> Result<u16> {
        let addr = self.bind(port).await?;
        self.serve()?;
        Ok(addr.port())
    }

    /// Stop the server immediately.
    ///
    /// In-flight calls are abandoned and their contract futures dropped.
    /// Calling this more than once is harmless.
    pub async fn stop(&mut self) {
        if self.state == ServerState::Stopped {
            return;
        }

        self.cancel.cancel();
        self.listener = None;
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
            // Cancelled JoinError is expected here
            let _ = handle.await;
        }

        self.state = ServerState::Stopped;
        info!("Plugin server stopped");
    }

    fn expect_state(&self, expected: ServerState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PluginError::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }
}

impl<C> Drop for PluginServer<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}
