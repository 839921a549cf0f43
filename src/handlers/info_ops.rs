//! Diagnostic handlers: server_info, db_stats, memory_info, test_connection

use crate::context::ServerContext;
use crate::error::Result;
use crate::store::{parse_info, parse_keyspace_fields};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

/// Result of `server_info`: picked fields plus the full parsed section.
#[derive(Debug, Serialize)]
pub struct ServerInfoResult {
    pub redis_version: Option<String>,
    pub redis_mode: Option<String>,
    pub os: Option<String>,
    pub tcp_port: Option<i64>,
    pub uptime_in_seconds: Option<i64>,
    pub fields: BTreeMap<String, String>,
}

/// Result of `db_stats`.
#[derive(Debug, Serialize)]
pub struct DbStatsResult {
    pub dbsize: i64,
    pub databases: BTreeMap<String, BTreeMap<String, String>>,
}

/// Result of `memory_info`.
#[derive(Debug, Serialize)]
pub struct MemoryInfoResult {
    pub used_memory: Option<i64>,
    pub used_memory_human: Option<String>,
    pub used_memory_peak: Option<i64>,
    pub used_memory_peak_human: Option<String>,
    pub maxmemory: Option<i64>,
    pub maxmemory_policy: Option<String>,
}

/// Result of `test_connection`. This tool never fails; connection problems
/// are captured in the payload.
#[derive(Debug, Serialize)]
pub struct TestConnectionResult {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

fn field_i64(fields: &BTreeMap<String, String>, name: &str) -> Option<i64> {
    fields.get(name).and_then(|v| v.parse().ok())
}

/// Handle the `server_info` tool
pub async fn handle_server_info(ctx: &ServerContext, _args: Value) -> Result<Value> {
    info!("Collecting server info");

    let text = ctx.store.info("server").await?;
    let fields = parse_info(&text);

    let result = ServerInfoResult {
        redis_version: fields.get("redis_version").cloned(),
        redis_mode: fields.get("redis_mode").cloned(),
        os: fields.get("os").cloned(),
        tcp_port: field_i64(&fields, "tcp_port"),
        uptime_in_seconds: field_i64(&fields, "uptime_in_seconds"),
        fields,
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `db_stats` tool
pub async fn handle_db_stats(ctx: &ServerContext, _args: Value) -> Result<Value> {
    info!("Collecting keyspace stats");

    let dbsize = ctx.store.dbsize().await?;
    let text = ctx.store.info("keyspace").await?;

    let databases = parse_info(&text)
        .into_iter()
        .map(|(db, value)| (db, parse_keyspace_fields(&value)))
        .collect();

    let result = DbStatsResult { dbsize, databases };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `memory_info` tool
pub async fn handle_memory_info(ctx: &ServerContext, _args: Value) -> Result<Value> {
    info!("Collecting memory info");

    let text = ctx.store.info("memory").await?;
    let fields = parse_info(&text);

    let result = MemoryInfoResult {
        used_memory: field_i64(&fields, "used_memory"),
        used_memory_human: fields.get("used_memory_human").cloned(),
        used_memory_peak: field_i64(&fields, "used_memory_peak"),
        used_memory_peak_human: fields.get("used_memory_peak_human").cloned(),
        maxmemory: field_i64(&fields, "maxmemory"),
        maxmemory_policy: fields.get("maxmemory_policy").cloned(),
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `test_connection` tool
pub async fn handle_test_connection(ctx: &ServerContext, _args: Value) -> Result<Value> {
    let result = match ctx.store.ping().await {
        Ok(()) => TestConnectionResult {
            connected: true,
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        },
        Err(e) => TestConnectionResult {
            connected: false,
            error: Some(e.to_string()),
            timestamp: Utc::now().to_rfc3339(),
        },
    };
    Ok(serde_json::to_value(result)?)
}
