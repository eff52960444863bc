//! The capability a plugin author implements.

use crate::codec::{self, DynamicValue};
use crate::error::Result;
use crate::proto::{ExecutionRequestBody, ExecutionResponse};
use async_trait::async_trait;
use prost_types::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A single `Execute` request as seen by plugin code.
///
/// `args` and `options` stay boxed; use [`arg`](Self::arg) and
/// [`option`](Self::option) (or [`codec::unpack`]) to decode what you need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionRequest {
    pub input: String,
    pub args: HashMap<String, Any>,
    pub options: HashMap<String, Any>,
}

impl ExecutionRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    /// Add a boxed argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: Any) -> Self {
        self.args.insert(key.into(), value);
        self
    }

    /// Add a boxed option.
    pub fn with_option(mut self, key: impl Into<String>, value: Any) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Decode a single argument, `None` if it was not sent.
    pub fn arg(&self, key: &str) -> Result<Option<DynamicValue>> {
        self.args.get(key).map(codec::unpack).transpose()
    }

    /// Decode a single option, `None` if it was not sent.
    pub fn option(&self, key: &str) -> Result<Option<DynamicValue>> {
        self.options.get(key).map(codec::unpack).transpose()
    }
}

impl From<ExecutionRequestBody> for ExecutionRequest {
    fn from(body: ExecutionRequestBody) -> Self {
        Self {
            input: body.input,
            args: body.args,
            options: body.options,
        }
    }
}

impl From<ExecutionRequest> for ExecutionRequestBody {
    fn from(request: ExecutionRequest) -> Self {
        Self {
            input: request.input,
            args: request.args,
            options: request.options,
        }
    }
}

impl ExecutionResponse {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}

/// Plugin logic behind the `Execute` RPC.
///
/// One instance serves every call for the life of the process, and calls may
/// run concurrently, so any mutable state must be synchronized by the
/// implementation.
///
/// Returning `Err` makes the caller see an internal transport error carrying
/// the error's message. Implementations that prefer to report failures in-band
/// can catch them and describe them in [`ExecutionResponse::result`] instead.
#[async_trait]
pub trait PluginContract: Send + Sync + 'static {
    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<ExecutionResponse>;
}

#[async_trait]
impl<C: PluginContract + ?Sized> PluginContract for Arc<C> {
    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<ExecutionResponse> {
        (**self).execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pack;

    struct Echo;

    #[async_trait]
    impl PluginContract for Echo {
        async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<ExecutionResponse> {
            Ok(ExecutionResponse::new(request.input))
        }
    }

    #[test]
    fn test_request_accessors() {
        let request = ExecutionRequest::new("hello")
            .with_arg("count", pack(2.0, None))
            .with_option("op", pack("reverse", None));

        assert_eq!(request.arg("count").unwrap(), Some(DynamicValue::Number(2.0)));
        assert_eq!(
            request.option("op").unwrap(),
            Some(DynamicValue::String("reverse".to_string()))
        );
        assert_eq!(request.arg("missing").unwrap(), None);
    }

    #[test]
    fn test_body_conversion_preserves_fields() {
        let request = ExecutionRequest::new("x").with_option("flag", pack(true, None));
        let body = ExecutionRequestBody::from(request.clone());
        assert_eq!(body.input, "x");
        assert_eq!(ExecutionRequest::from(body), request);
    }

    #[tokio::test]
    async fn test_arc_contract_delegates() {
        let contract: Arc<dyn PluginContract> = Arc::new(Echo);
        let response = contract.execute(ExecutionRequest::new("ping")).await.unwrap();
        assert_eq!(response.result, "ping");
    }
}
