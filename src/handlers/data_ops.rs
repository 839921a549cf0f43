//! Data operation handlers: get, set, update, delete, list_keys

use super::value_codec::{read_typed, write_typed, TtlState, ValueKind};
use super::{optional_str, optional_ttl, require_str};
use crate::context::ServerContext;
use crate::error::{McpError, Result};
use crate::permissions::Action;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Result of `get`.
#[derive(Debug, Serialize)]
pub struct GetResult {
    pub key: String,
    pub value: Value,
    pub exists: bool,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub ttl: Option<TtlState>,
}

/// Result of `set` and `update`.
#[derive(Debug, Serialize)]
pub struct WriteResult {
    pub key: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub type_name: ValueKind,
    pub ttl: Option<i64>,
    pub result: Value,
}

/// Result of `delete`.
#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub key: String,
    pub deleted: bool,
    pub result: i64,
}

/// One annotated key in a `list_keys` page.
#[derive(Debug, Serialize)]
pub struct KeyAnnotation {
    pub key: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub ttl: TtlState,
}

/// Result of `list_keys`.
#[derive(Debug, Serialize)]
pub struct ListKeysResult {
    pub keys: Vec<KeyAnnotation>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    pub pattern: String,
}

/// Handle the `get` tool
pub async fn handle_get(ctx: &ServerContext, args: Value) -> Result<Value> {
    let key = require_str(&args, "key")?;

    info!(key, "Reading value");

    if !ctx.store.exists(key).await? {
        let result = GetResult {
            key: key.to_string(),
            value: Value::Null,
            exists: false,
            type_name: None,
            ttl: None,
        };
        return Ok(serde_json::to_value(result)?);
    }

    let type_name = ctx.store.key_type(key).await?;
    let value = read_typed(&ctx.store, key, &type_name).await?;
    let ttl = TtlState::from_store(ctx.store.ttl(key).await?);

    let result = GetResult {
        key: key.to_string(),
        value,
        exists: true,
        type_name: Some(type_name),
        ttl: Some(ttl),
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `set` tool
pub async fn handle_set(ctx: &ServerContext, args: Value) -> Result<Value> {
    ctx.check_permission(Action::Insert)?;

    let key = require_str(&args, "key")?;
    let value = args
        .get("value")
        .cloned()
        .ok_or_else(|| McpError::InvalidParams("Missing 'value' parameter".to_string()))?;
    let kind = ValueKind::parse(optional_str(&args, "type")?)?;
    let ttl = optional_ttl(&args)?;

    info!(key, kind = kind.as_str(), "Writing value");

    let reply = write_typed(&ctx.store, key, &value, kind, ttl).await?;

    let result = WriteResult {
        key: key.to_string(),
        value,
        type_name: kind,
        ttl,
        result: reply,
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `update` tool: same replace semantics as `set`, but the key
/// must already exist.
pub async fn handle_update(ctx: &ServerContext, args: Value) -> Result<Value> {
    ctx.check_permission(Action::Update)?;

    let key = require_str(&args, "key")?;
    let value = args
        .get("value")
        .cloned()
        .ok_or_else(|| McpError::InvalidParams("Missing 'value' parameter".to_string()))?;
    let kind = ValueKind::parse(optional_str(&args, "type")?)?;
    let ttl = optional_ttl(&args)?;

    if !ctx.store.exists(key).await? {
        return Err(McpError::NotFound(format!("Key '{}' does not exist", key)));
    }

    info!(key, kind = kind.as_str(), "Updating value");

    let reply = write_typed(&ctx.store, key, &value, kind, ttl).await?;

    let result = WriteResult {
        key: key.to_string(),
        value,
        type_name: kind,
        ttl,
        result: reply,
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `delete` tool. Deleting an absent key is a no-op result, not
/// an error.
pub async fn handle_delete(ctx: &ServerContext, args: Value) -> Result<Value> {
    ctx.check_permission(Action::Delete)?;

    let key = require_str(&args, "key")?;

    info!(key, "Deleting value");

    let removed = ctx.store.delete(key).await?;

    let result = DeleteResult {
        key: key.to_string(),
        deleted: removed > 0,
        result: removed,
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `list_keys` tool
pub async fn handle_list_keys(ctx: &ServerContext, args: Value) -> Result<Value> {
    let pattern = optional_str(&args, "pattern")?.unwrap_or("*").to_string();

    let limit = match args.get("limit") {
        None | Some(Value::Null) => 100,
        Some(value) => value
            .as_i64()
            .ok_or_else(|| McpError::InvalidParams("'limit' must be an integer".to_string()))?,
    };
    if !(1..=10_000).contains(&limit) {
        return Err(McpError::InvalidParams(
            "'limit' must be between 1 and 10000".to_string(),
        ));
    }

    let offset = match args.get("offset") {
        None | Some(Value::Null) => 0,
        Some(value) => value
            .as_i64()
            .ok_or_else(|| McpError::InvalidParams("'offset' must be an integer".to_string()))?,
    };
    if offset < 0 {
        return Err(McpError::InvalidParams(
            "'offset' must be non-negative".to_string(),
        ));
    }

    let (limit, offset) = (limit as usize, offset as usize);

    info!(pattern = %pattern, limit, offset, "Listing keys");

    let mut keys = ctx.store.keys(&pattern).await?;
    keys.sort();
    let total = keys.len();

    let mut annotated = Vec::new();
    for key in keys.into_iter().skip(offset).take(limit) {
        let type_name = ctx.store.key_type(&key).await?;
        let ttl = TtlState::from_store(ctx.store.ttl(&key).await?);
        annotated.push(KeyAnnotation {
            key,
            type_name,
            ttl,
        });
    }

    let result = ListKeysResult {
        keys: annotated,
        total,
        limit,
        offset,
        has_more: offset + limit < total,
        pattern,
    };
    Ok(serde_json::to_value(result)?)
}
