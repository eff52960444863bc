//! plugrpc SDK - expose CLI plugin logic as an out-of-process gRPC service.
//!
//! A plugin is a separate process that implements [`PluginContract`] and
//! serves it through one RPC, `Execute`, on an insecure loopback channel. On
//! startup it prints `PLUGIN_PORT=<port>` to stdout; the parent reads that
//! line and connects. Request arguments and options travel as boxed values
//! (`google.protobuf.Any`) that the [`codec`] module packs and unpacks.
//!
//! # Example
//!
//! ```rust,ignore
//! use plugrpc_sdk::{ExecutionRequest, ExecutionResponse, PluginContract};
//!
//! struct Shout;
//!
//! #[plugrpc_sdk::async_trait]
//! impl PluginContract for Shout {
//!     async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<ExecutionResponse> {
//!         Ok(ExecutionResponse::new(request.input.to_uppercase()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     plugrpc_sdk::logging::init(false);
//!     plugrpc_sdk::serve(Shout).await
//! }
//! ```

pub mod proto {
    //! Types generated from `proto/plugin.proto`.
    #![allow(missing_docs)]
    tonic::include_proto!("plugin");
}

pub mod app;
pub mod client;
pub mod codec;
pub mod config;
pub mod contract;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod server;
pub mod signal;

// Re-export commonly used types
pub use app::{serve, PluginApp};
pub use client::PluginProcess;
pub use codec::{pack, pack_serializable, unpack, unpack_map, DynamicValue};
pub use config::ServerConfig;
pub use contract::{ExecutionRequest, PluginContract};
pub use dispatcher::RequestDispatcher;
pub use error::{PluginError, Result};
pub use proto::{ExecutionRequestBody, ExecutionResponse};
pub use server::{PluginServer, ServerState};
pub use signal::{shutdown_signal, ShutdownSignals};

// Re-exported so plugin crates implement the contract without extra dependencies
pub use async_trait::async_trait;
pub use prost_types::Any;
pub use tonic;
