//! Warehouse-specific error types.

use std::io;
use thiserror::Error;

/// Result type for warehouse operations.
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Errors that can occur talking to the warehouse data API.
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// Failed to spawn the sidecar process.
    #[error("failed to spawn data-api sidecar: {0}")]
    SpawnFailed(#[source] io::Error),

    /// Failed to write to sidecar stdin.
    #[error("failed to write to sidecar: {0}")]
    WriteFailed(#[source] io::Error),

    /// Failed to read from sidecar stdout.
    #[error("failed to read from sidecar: {0}")]
    ReadFailed(#[source] io::Error),

    /// Failed to serialize a request to JSON.
    #[error("failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize a response from JSON.
    #[error("failed to deserialize response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// Request timed out waiting for a response.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Sidecar process exited unexpectedly.
    #[error("data-api sidecar exited unexpectedly")]
    SidecarExited,

    /// Response channel was closed (internal error).
    #[error("response channel closed unexpectedly")]
    ChannelClosed,

    /// The warehouse returned an error response.
    #[error("warehouse error: {message} (code: {code})")]
    Remote {
        /// Error code from the warehouse.
        code: String,
        /// Error message from the warehouse.
        message: String,
    },

    /// Statement handle not recognized by the warehouse.
    #[error("statement not found: {0}")]
    StatementNotFound(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl WarehouseError {
    /// Create a remote error from an error response.
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Check if this error indicates the sidecar has exited.
    pub fn is_sidecar_exited(&self) -> bool {
        matches!(self, Self::SidecarExited | Self::ChannelClosed)
    }

    /// Check if this error is retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::SidecarExited | Self::ChannelClosed
        )
    }
}

impl From<io::Error> for WarehouseError {
    fn from(err: io::Error) -> Self {
        Self::WriteFailed(err)
    }
}

impl From<serde_json::Error> for WarehouseError {
    fn from(err: serde_json::Error) -> Self {
        Self::DeserializeFailed(err)
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for WarehouseError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
