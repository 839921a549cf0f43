//! JSON-RPC 2.0 protocol layer
//!
//! Message types and the line-delimited stdio transport used to talk to the
//! MCP client.

pub mod jsonrpc;
pub mod transport;

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use transport::StdioTransport;
