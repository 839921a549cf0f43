//! MCP server implementation
//!
//! The request dispatcher: protocol state, method routing, capability
//! negotiation, tool dispatch, and the serve loop that drives it all from
//! stdin. Every dispatch, successful or not, is recorded in the audit log
//! before its response is emitted.

pub mod lifecycle;
pub mod tools;

use crate::context::ServerContext;
use crate::error::{McpError, Result};
use crate::handlers::{data_ops, info_ops, key_ops};
use crate::protocol::jsonrpc::JSONRPC_VERSION;
use crate::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, StdioTransport,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

pub use lifecycle::{LifecycleController, ProcessLifecycle};
pub use tools::ToolDefinition;

/// Wire protocol revision advertised and echoed during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Capability keys mirrored back when the client declares them. The server
/// never advertises one the client did not request first.
const MIRRORED_CAPABILITIES: [&str; 4] = ["prompts", "resources", "logging", "roots"];

/// Every tool name `tools/call` can route. Must stay in step with the
/// full-permission manifest in [`tools::get_all_tools`]; a test asserts the
/// bijection.
pub const KNOWN_TOOLS: &[&str] = &[
    "get",
    "set",
    "update",
    "delete",
    "list_keys",
    "create_key",
    "drop_key",
    "exists_key",
    "get_key_info",
    "rename_key",
    "set_ttl",
    "remove_ttl",
    "server_info",
    "db_stats",
    "memory_info",
    "test_connection",
];

/// MCP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name
    pub name: String,

    /// Server version
    pub version: String,

    /// Delay between the `shutdown` response and process exit, so the
    /// response can flush.
    pub shutdown_grace: Duration,

    /// Interval between store health probes.
    pub probe_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "redis-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            shutdown_grace: Duration::from_millis(100),
            probe_interval: Duration::from_secs(30),
        }
    }
}

/// MCP server
pub struct McpServer {
    context: Arc<ServerContext>,
    config: ServerConfig,
    lifecycle: Arc<dyn LifecycleController>,
    initialized: AtomicBool,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(
        context: ServerContext,
        config: ServerConfig,
        lifecycle: Arc<dyn LifecycleController>,
    ) -> Self {
        info!(
            server = %config.name,
            version = %config.version,
            target = context.store.connection_target(),
            "MCP server initialized"
        );

        Self {
            context: Arc::new(context),
            config,
            lifecycle,
            initialized: AtomicBool::new(false),
        }
    }

    /// Serve requests over stdio until EOF, an interrupt, or a terminal
    /// method. Input lines are processed strictly in order, each awaited to
    /// completion before the next is read.
    pub async fn serve_stdio(&self) -> Result<()> {
        let mut transport = StdioTransport::new();
        let probe = self.spawn_health_probe();

        info!("MCP server listening on stdio");

        loop {
            let line = tokio::select! {
                line = transport.read_line() => line,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received interrupt, shutting down");
                    self.context.store.close().await;
                    break;
                }
            };

            match line {
                Ok(Some(line)) => {
                    let request: JsonRpcRequest = match serde_json::from_str(&line) {
                        Ok(request) => request,
                        Err(e) => {
                            error!(error = %e, "Failed to parse request line");
                            // One malformed line never ends the session: a
                            // synthetic id-less error goes out and the next
                            // line is read as usual.
                            let response = JsonRpcResponse::error(
                                None,
                                JsonRpcError::internal_error(format!(
                                    "Failed to parse request: {}",
                                    e
                                )),
                            );
                            transport.write_response(&response).await?;
                            continue;
                        }
                    };

                    if let Some(response) = self.handle_request(request).await {
                        transport.write_response(&response).await?;
                    }
                }
                Ok(None) => {
                    info!("Client disconnected");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read from stdin");
                    break;
                }
            }
        }

        probe.abort();
        transport.close().await?;
        Ok(())
    }

    /// Handle one JSON-RPC request. Returns `None` for notifications, which
    /// never receive a response; their failures are logged only.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let is_notification = request.is_notification();
        let params = request.params.clone().unwrap_or(Value::Null);

        let result = if request.jsonrpc != JSONRPC_VERSION {
            Err(McpError::Protocol(request.jsonrpc.clone()))
        } else {
            self.dispatch(&request.method, params.clone()).await
        };

        // Audit chokepoint: exactly one entry per dispatch, before the
        // response is returned.
        let (operation, recorded_params) = audit_label(&request.method, &params);
        let (recorded_result, recorded_error) = match &result {
            Ok(Some(value)) => (Some(value.to_string()), None),
            Ok(None) => (None, None),
            Err(e) => (None, Some(e.to_string())),
        };
        self.context
            .audit
            .record(&operation, &recorded_params, recorded_result, recorded_error)
            .await;

        match result {
            Ok(Some(value)) => id.map(|id| JsonRpcResponse::success(id, value)),
            Ok(None) => None,
            Err(e) => {
                warn!(method = %request.method, error = %e, "Request failed");
                if is_notification {
                    None
                } else {
                    Some(JsonRpcResponse::error(id, e.to_jsonrpc()))
                }
            }
        }
    }

    /// Route a method to its handler. `Ok(None)` marks a notification with
    /// no response channel.
    async fn dispatch(&self, method: &str, params: Value) -> Result<Option<Value>> {
        match method {
            "initialize" => self.handle_initialize(params).map(Some),
            "tools/list" => self.handle_tools_list().map(Some),
            "tools/call" => self.handle_tools_call(params).await.map(Some),
            "ping" => Ok(Some(json!({"pong": true}))),
            "shutdown" => self.handle_shutdown().map(Some),
            "notifications/initialized" => {
                self.handle_initialized_notification().await;
                Ok(None)
            }
            "notifications/exit" => {
                self.handle_exit_notification().await;
                Ok(None)
            }
            // Protocol-compatibility stubs: present so standard clients can
            // enumerate these surfaces, but nothing is behind them.
            "prompts/list" => Ok(Some(json!({"prompts": []}))),
            "prompts/call" => Ok(Some(json!({
                "description": "Prompts are not supported by this server",
                "messages": []
            }))),
            "resources/list" => Ok(Some(json!({"resources": []}))),
            "resources/read" => Ok(Some(json!({"contents": []}))),
            "logging/list" => Ok(Some(json!({"logs": []}))),
            "logging/read" => Ok(Some(json!({"entries": []}))),
            "roots/list" => Ok(Some(json!({"roots": []}))),
            "roots/read" => Ok(Some(json!({"contents": []}))),
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    /// Handle `initialize`: echo the requested protocol version and mirror
    /// the client's optional capability keys. Idempotent; a repeat call is
    /// answered in full without re-running first-call side effects.
    fn handle_initialize(&self, params: Value) -> Result<Value> {
        let client_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        let mut capabilities = Map::new();
        capabilities.insert("tools".to_string(), json!({}));
        if let Some(declared) = params.get("capabilities").and_then(Value::as_object) {
            for key in MIRRORED_CAPABILITIES {
                if declared.contains_key(key) {
                    capabilities.insert(key.to_string(), json!({}));
                }
            }
        }

        let first = !self.initialized.swap(true, Ordering::SeqCst);
        if first {
            info!(
                client = %params
                    .get("clientInfo")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
                version = client_version,
                "Session initialized"
            );
        } else {
            debug!("Repeated initialize accepted");
        }

        Ok(json!({
            "protocolVersion": client_version,
            "capabilities": Value::Object(capabilities),
            "serverInfo": {
                "name": self.config.name,
                "version": self.config.version
            }
        }))
    }

    /// Handle `tools/list`: manifest rebuilt from the current flags, plus a
    /// diagnostic echo of the flags and the connection target.
    fn handle_tools_list(&self) -> Result<Value> {
        let tools = tools::get_all_tools(&self.context.policy);

        Ok(json!({
            "tools": tools,
            "permissions": self.context.policy.summary(),
            "connection": self.context.store.connection_target(),
        }))
    }

    /// Handle `tools/call`: validate the envelope, route to the operation,
    /// and wrap the raw result as a single pretty-printed text content
    /// block. The wrapping is part of the wire contract.
    async fn handle_tools_call(&self, params: Value) -> Result<Value> {
        if params.is_null() {
            return Err(McpError::InvalidParams("Missing parameters".to_string()));
        }

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::InvalidParams("Missing tool name".to_string()))?;

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        info!(tool = name, "Calling tool");

        let result = self.dispatch_tool(name, arguments).await?;

        Ok(json!({
            "content": [
                {
                    "type": "text",
                    "text": serde_json::to_string_pretty(&result)
                        .unwrap_or_else(|_| result.to_string())
                }
            ]
        }))
    }

    /// Route a tool name to its operation. An unknown tool is an ordinary
    /// error, not a protocol-level method-not-found.
    async fn dispatch_tool(&self, name: &str, args: Value) -> Result<Value> {
        let ctx = &self.context;
        match name {
            "get" => data_ops::handle_get(ctx, args).await,
            "set" => data_ops::handle_set(ctx, args).await,
            "update" => data_ops::handle_update(ctx, args).await,
            "delete" => data_ops::handle_delete(ctx, args).await,
            "list_keys" => data_ops::handle_list_keys(ctx, args).await,
            "create_key" => key_ops::handle_create_key(ctx, args).await,
            "drop_key" => key_ops::handle_drop_key(ctx, args).await,
            "exists_key" => key_ops::handle_exists_key(ctx, args).await,
            "get_key_info" => key_ops::handle_get_key_info(ctx, args).await,
            "rename_key" => key_ops::handle_rename_key(ctx, args).await,
            "set_ttl" => key_ops::handle_set_ttl(ctx, args).await,
            "remove_ttl" => key_ops::handle_remove_ttl(ctx, args).await,
            "server_info" => info_ops::handle_server_info(ctx, args).await,
            "db_stats" => info_ops::handle_db_stats(ctx, args).await,
            "memory_info" => info_ops::handle_memory_info(ctx, args).await,
            "test_connection" => info_ops::handle_test_connection(ctx, args).await,
            _ => Err(McpError::Internal(format!("Unknown tool: {}", name))),
        }
    }

    /// Handle `shutdown`: answer with a null result now, then close the
    /// store and exit once the grace delay has let the response flush.
    fn handle_shutdown(&self) -> Result<Value> {
        info!("Shutdown requested");

        let store = Arc::clone(&self.context.store);
        let lifecycle = Arc::clone(&self.lifecycle);
        let grace = self.config.shutdown_grace;

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            store.close().await;
            lifecycle.exit(0);
        });

        Ok(Value::Null)
    }

    /// Handle `notifications/initialized`: probe connection health. There
    /// is no response channel, so failures are only logged.
    async fn handle_initialized_notification(&self) {
        debug!("Client reports initialization complete");

        if let Err(e) = self.context.store.ping().await {
            warn!(error = %e, "Post-initialization connection probe failed");
        }
    }

    /// Handle `notifications/exit`: close and terminate immediately.
    async fn handle_exit_notification(&self) {
        info!("Exit notification received");
        self.context.store.close().await;
        self.lifecycle.exit(0);
    }

    fn spawn_health_probe(&self) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.context.store);
        let interval = self.config.probe_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would probe before any connection
            // exists; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.probe().await;
            }
        })
    }
}

/// Audit labels: tool calls are recorded as `tools/call:<tool>` with their
/// arguments; everything else as the method with its params.
fn audit_label(method: &str, params: &Value) -> (String, String) {
    if method == "tools/call" {
        let tool = params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        (format!("tools/call:{}", tool), arguments.to_string())
    } else {
        (method.to_string(), params.to_string())
    }
}
