//! Binds a [`PluginContract`] to the `Execute` RPC.
//!
//! The dispatcher is the containment boundary for plugin failures: contract
//! errors and panics both come back to the caller as `Status::internal`, and
//! neither reaches the transport.

use crate::contract::{ExecutionRequest, PluginContract};
use crate::proto::plugin_server::Plugin;
use crate::proto::{ExecutionRequestBody, ExecutionResponse};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, error};

/// Message used when a failure carries no description of its own.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown plugin error";

/// Adapter from the generated `Plugin` service to a [`PluginContract`].
///
/// Holds no per-call state, so any number of calls can be in flight at once.
pub struct RequestDispatcher<C> {
    contract: Arc<C>,
    cancel: CancellationToken,
}

impl<C> Clone for RequestDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            contract: self.contract.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<C: PluginContract> RequestDispatcher<C> {
    pub fn new(contract: Arc<C>, cancel: CancellationToken) -> Self {
        Self { contract, cancel }
    }

    /// Run one call through the contract and map the outcome to a transport result.
    pub async fn dispatch(
        &self,
        request: ExecutionRequest,
    ) -> std::result::Result<ExecutionResponse, Status> {
        if self.cancel.is_cancelled() {
            return Err(Status::unavailable("plugin server is stopping"));
        }

        let call = AssertUnwindSafe(self.contract.execute(request)).catch_unwind();

        let outcome = tokio::select! {
            outcome = call => outcome,
            _ = self.cancel.cancelled() => {
                debug!("Execute abandoned: server stopped");
                return Err(Status::cancelled("plugin server stopped"));
            }
        };

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                let message = describe(e.to_string());
                error!("Plugin execute failed: {}", message);
                Err(Status::internal(message))
            }
            Err(panic) => {
                let message = describe(panic_message(panic.as_ref()));
                error!("Plugin execute panicked: {}", message);
                Err(Status::internal(message))
            }
        }
    }
}

#[tonic::async_trait]
impl<C: PluginContract> Plugin for RequestDispatcher<C> {
    async fn execute(
        &self,
        request: Request<ExecutionRequestBody>,
    ) -> std::result::Result<Response<ExecutionResponse>, Status> {
        let body = request.into_inner();
        debug!(
            "Execute call: input={} bytes, {} args, {} options",
            body.input.len(),
            body.args.len(),
            body.options.len()
        );

        self.dispatch(ExecutionRequest::from(body))
            .await
            .map(Response::new)
    }
}

fn describe(message: String) -> String {
    if message.trim().is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::new()
    }
}
