//! Text transform plugin logic.
//!
//! The `op` option selects one of four operations; without it the input is
//! upper-cased. A boolean `trim` argument strips surrounding whitespace
//! first.

use anyhow::{anyhow, bail};
use plugrpc_sdk::{async_trait, DynamicValue, ExecutionRequest, ExecutionResponse, PluginContract};
use tracing::debug;

/// Supported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Uppercase,
    Lowercase,
    Reverse,
    Length,
}

impl Operation {
    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "uppercase" | "upper" => Some(Operation::Uppercase),
            "lowercase" | "lower" => Some(Operation::Lowercase),
            "reverse" => Some(Operation::Reverse),
            "length" | "len" => Some(Operation::Length),
            _ => None,
        }
    }

    pub fn apply(self, input: &str) -> String {
        match self {
            Operation::Uppercase => input.to_uppercase(),
            Operation::Lowercase => input.to_lowercase(),
            Operation::Reverse => input.chars().rev().collect(),
            Operation::Length => input.chars().count().to_string(),
        }
    }
}

/// The reference plugin contract.
#[derive(Debug, Default)]
pub struct TextTransform;

#[async_trait]
impl PluginContract for TextTransform {
    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<ExecutionResponse> {
        let op = match request.option("op")? {
            None => Operation::Uppercase,
            Some(DynamicValue::String(name)) => Operation::from_str(&name)
                .ok_or_else(|| anyhow!("Unsupported operation: {}", name))?,
            Some(other) => bail!("Option 'op' must be a string, got {}", other),
        };

        let trim = match request.arg("trim")? {
            None => false,
            Some(DynamicValue::Bool(b)) => b,
            Some(other) => bail!("Argument 'trim' must be a boolean, got {}", other),
        };

        let input = if trim {
            request.input.trim()
        } else {
            request.input.as_str()
        };

        debug!("Applying {:?} to {} chars", op, input.chars().count());
        Ok(ExecutionResponse::new(op.apply(input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugrpc_sdk::pack;

    async fn run(request: ExecutionRequest) -> anyhow::Result<String> {
        Ok(TextTransform.execute(request).await?.result)
    }

    fn with_op(input: &str, op: &str) -> ExecutionRequest {
        ExecutionRequest::new(input).with_option("op", pack(op, None))
    }

    #[tokio::test]
    async fn test_operations() {
        assert_eq!(run(with_op("hello", "reverse")).await.unwrap(), "olleh");
        assert_eq!(run(with_op("Hello", "uppercase")).await.unwrap(), "HELLO");
        assert_eq!(run(with_op("Hello", "lowercase")).await.unwrap(), "hello");
        assert_eq!(run(with_op("héllo", "length")).await.unwrap(), "5");
    }

    #[tokio::test]
    async fn test_defaults_to_uppercase() {
        assert_eq!(run(ExecutionRequest::new("abc")).await.unwrap(), "ABC");
    }

    #[tokio::test]
    async fn test_trim_argument() {
        let request = with_op("  padded  ", "reverse").with_arg("trim", pack(true, None));
        assert_eq!(run(request).await.unwrap(), "deddap");
    }

    #[tokio::test]
    async fn test_unknown_operation_fails() {
        let err = run(with_op("x", "rot13")).await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operation: rot13");
    }

    #[tokio::test]
    async fn test_wrongly_typed_option_fails() {
        let request = ExecutionRequest::new("x").with_option("op", pack(3.0, None));
        let err = run(request).await.unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_reverse_handles_multibyte() {
        assert_eq!(Operation::Reverse.apply("añb"), "bña");
    }
}
