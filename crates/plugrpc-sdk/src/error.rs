//! Error types for the plugin SDK.
//!
//! Contract implementations fail with [`anyhow::Error`]; everything the SDK
//! itself can fail with is a [`PluginError`].

use std::net::SocketAddr;
use thiserror::Error;

/// Main error type for the plugin SDK.
#[derive(Debug, Error)]
pub enum PluginError {
    // Server lifecycle errors
    #[error("Failed to bind plugin server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Invalid server state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    // Boxed value errors
    #[error("Failed to encode value: {message}")]
    Encoding {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Failed to decode value of type {type_url}: {message}")]
    Decoding {
        type_url: String,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Parent-side errors
    #[error("Plugin handshake failed: {message}")]
    Handshake { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plugin call failed: {0}")]
    Rpc(#[from] tonic::Status),
}

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// Create an encoding error from a serialization failure.
    pub fn encoding(err: serde_json::Error) -> Self {
        PluginError::Encoding {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a decoding error for a boxed value with the given type URL.
    pub fn decoding(type_url: impl Into<String>, err: serde_json::Error) -> Self {
        PluginError::Decoding {
            type_url: type_url.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Check if this error happened while the server was starting up.
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            PluginError::Bind { .. } | PluginError::Transport(_) | PluginError::InvalidState { .. }
        )
    }
}
