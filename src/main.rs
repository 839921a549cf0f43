use anyhow::Result;
use clap::Parser;
use redis_mcp::audit::{AuditLog, DEFAULT_RING_CAPACITY};
use redis_mcp::{
    McpServer, PermissionPolicy, ProcessLifecycle, RedisStore, ServerConfig, ServerContext,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Redis MCP Server - expose a Redis store to MCP clients over stdio
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Redis connection URL
    #[clap(long = "redis-url", env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Durable audit log path (JSON lines)
    #[clap(
        long = "audit-log",
        env = "REDIS_MCP_AUDIT_LOG",
        default_value = "redis-mcp-audit.log"
    )]
    audit_log: PathBuf,

    /// Keep the audit trail in memory only
    #[clap(long)]
    no_audit_file: bool,

    /// Enable verbose logging
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        error!(error = %e, "Fatal server error");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let policy = PermissionPolicy::from_env();

    let audit = if args.no_audit_file {
        AuditLog::in_memory(DEFAULT_RING_CAPACITY)
    } else {
        AuditLog::with_file(&args.audit_log, DEFAULT_RING_CAPACITY).await
    };

    let context = ServerContext::new(RedisStore::new(args.redis_url), policy, audit);
    let server = McpServer::new(context, ServerConfig::default(), Arc::new(ProcessLifecycle));

    server.serve_stdio().await?;
    Ok(())
}

/// Logs go to stderr; stdout belongs to the JSON-RPC transport.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
