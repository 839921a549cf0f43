//! Error types for the MCP server

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, McpError>;

/// MCP server errors
///
/// Covers the full failure taxonomy: protocol-shape errors, unknown methods,
/// argument validation, permission denials, missing/conflicting keys, and
/// store failures. JSON-RPC code selection lives in [`McpError::to_jsonrpc`]
/// and nowhere else.
#[derive(Debug, Error)]
pub enum McpError {
    /// Envelope carried a protocol version tag other than "2.0"
    #[error("Unsupported JSON-RPC version: {0}")]
    Protocol(String),

    /// RPC method is not in the dispatch table
    #[error("Unknown method: {0}")]
    MethodNotFound(String),

    /// Missing or malformed arguments
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Session has not completed `initialize`. Reserved: part of the
    /// taxonomy and the wire contract, but no dispatch path currently
    /// requires initialization.
    #[error("Server not initialized")]
    NotInitialized,

    /// A permission flag disallows the operation
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Operation requires a key that does not exist
    #[error("{0}")]
    NotFound(String),

    /// Operation would overwrite a key that already exists
    #[error("{0}")]
    Conflict(String),

    /// Failure from the underlying store
    #[error("Store error: {0}")]
    Store(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (including unknown tool names, which are not a
    /// protocol-level method-not-found)
    #[error("{0}")]
    Internal(String),
}

impl McpError {
    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            McpError::Protocol(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::InvalidParams(_) => -32602,
            McpError::NotInitialized => -32002,
            _ => -32603,
        }
    }

    /// Convert to a JSON-RPC error object. The message text is passed
    /// through unchanged.
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        JsonRpcError::new(self.code(), self.to_string())
    }
}
