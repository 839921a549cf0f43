//! # Redis MCP Server
//!
//! Model Context Protocol (MCP) server exposing a Redis key-value store to
//! AI assistants through a standardized JSON-RPC 2.0 interface over stdio.
//!
//! ## Architecture
//!
//! - **Protocol Layer**: JSON-RPC 2.0 types and the line-delimited stdio
//!   transport
//! - **Permission Layer**: five boolean flags gating the mutating tools
//! - **Server Layer**: request dispatcher, capability negotiation, and the
//!   permission-filtered tool registry
//! - **Handler Layer**: data, key-management and diagnostic operations
//! - **Store Layer**: typed adapter over the async Redis connection
//! - **Audit Layer**: bounded in-memory window plus durable append log of
//!   every dispatch
//!
//! ## Usage
//!
//! ```rust,no_run
//! use redis_mcp::{
//!     AuditLog, McpServer, PermissionPolicy, ProcessLifecycle, RedisStore,
//!     ServerConfig, ServerContext,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = ServerContext::new(
//!         RedisStore::new("redis://127.0.0.1:6379"),
//!         PermissionPolicy::from_env(),
//!         AuditLog::in_memory(1000),
//!     );
//!
//!     let server = McpServer::new(
//!         context,
//!         ServerConfig::default(),
//!         Arc::new(ProcessLifecycle),
//!     );
//!     server.serve_stdio().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod context;
pub mod error;
pub mod handlers;
pub mod permissions;
pub mod protocol;
pub mod server;
pub mod store;

// Re-export main types
pub use audit::{AuditEntry, AuditLog};
pub use context::ServerContext;
pub use error::{McpError, Result};
pub use permissions::{Action, PermissionPolicy};
pub use protocol::{JsonRpcRequest, JsonRpcResponse, StdioTransport};
pub use server::{LifecycleController, McpServer, ProcessLifecycle, ServerConfig};
pub use store::RedisStore;
