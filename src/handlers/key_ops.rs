//! Key operation handlers: create_key, drop_key, exists_key, get_key_info,
//! rename_key, set_ttl, remove_ttl

use super::value_codec::{size_of, write_typed, TtlState, ValueKind};
use super::{optional_str, optional_ttl, require_str};
use crate::context::ServerContext;
use crate::error::{McpError, Result};
use crate::permissions::Action;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Result of `create_key`.
#[derive(Debug, Serialize)]
pub struct CreateResult {
    pub key: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub type_name: ValueKind,
    pub ttl: Option<i64>,
    pub created: bool,
    pub result: Value,
}

/// Result of `drop_key`.
#[derive(Debug, Serialize)]
pub struct DropResult {
    pub key: String,
    pub dropped: bool,
    pub result: i64,
}

/// Result of `exists_key`.
#[derive(Debug, Serialize)]
pub struct ExistsResult {
    pub key: String,
    pub exists: bool,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub ttl: Option<TtlState>,
}

/// Result of `get_key_info`.
#[derive(Debug, Serialize)]
pub struct KeyInfoResult {
    pub key: String,
    pub exists: bool,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub ttl: Option<TtlState>,
    pub size: Option<i64>,
}

/// Result of `rename_key`.
#[derive(Debug, Serialize)]
pub struct RenameResult {
    #[serde(rename = "oldKey")]
    pub old_key: String,
    #[serde(rename = "newKey")]
    pub new_key: String,
    pub renamed: bool,
}

/// Result of `set_ttl`.
#[derive(Debug, Serialize)]
pub struct SetTtlResult {
    pub key: String,
    pub ttl: i64,
    pub set: bool,
}

/// Result of `remove_ttl`.
#[derive(Debug, Serialize)]
pub struct RemoveTtlResult {
    pub key: String,
    #[serde(rename = "ttlRemoved")]
    pub ttl_removed: bool,
}

/// Handle the `create_key` tool: like `set`, but the key must not exist.
pub async fn handle_create_key(ctx: &ServerContext, args: Value) -> Result<Value> {
    ctx.check_permission(Action::Create)?;

    let key = require_str(&args, "key")?;
    let value = args
        .get("value")
        .cloned()
        .ok_or_else(|| McpError::InvalidParams("Missing 'value' parameter".to_string()))?;
    let kind = ValueKind::parse(optional_str(&args, "type")?)?;
    let ttl = optional_ttl(&args)?;

    if ctx.store.exists(key).await? {
        return Err(McpError::Conflict(format!("Key '{}' already exists", key)));
    }

    info!(key, kind = kind.as_str(), "Creating key");

    let reply = write_typed(&ctx.store, key, &value, kind, ttl).await?;

    let result = CreateResult {
        key: key.to_string(),
        value,
        type_name: kind,
        ttl,
        created: true,
        result: reply,
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `drop_key` tool
pub async fn handle_drop_key(ctx: &ServerContext, args: Value) -> Result<Value> {
    ctx.check_permission(Action::Drop)?;

    let key = require_str(&args, "key")?;

    info!(key, "Dropping key");

    let removed = ctx.store.delete(key).await?;

    let result = DropResult {
        key: key.to_string(),
        dropped: removed > 0,
        result: removed,
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `exists_key` tool
pub async fn handle_exists_key(ctx: &ServerContext, args: Value) -> Result<Value> {
    let key = require_str(&args, "key")?;

    let result = if ctx.store.exists(key).await? {
        let type_name = ctx.store.key_type(key).await?;
        let ttl = TtlState::from_store(ctx.store.ttl(key).await?);
        ExistsResult {
            key: key.to_string(),
            exists: true,
            type_name: Some(type_name),
            ttl: Some(ttl),
        }
    } else {
        ExistsResult {
            key: key.to_string(),
            exists: false,
            type_name: None,
            ttl: None,
        }
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `get_key_info` tool
pub async fn handle_get_key_info(ctx: &ServerContext, args: Value) -> Result<Value> {
    let key = require_str(&args, "key")?;

    let result = if ctx.store.exists(key).await? {
        let type_name = ctx.store.key_type(key).await?;
        let ttl = TtlState::from_store(ctx.store.ttl(key).await?);
        let size = size_of(&ctx.store, key, &type_name).await?;
        KeyInfoResult {
            key: key.to_string(),
            exists: true,
            type_name: Some(type_name),
            ttl: Some(ttl),
            size,
        }
    } else {
        KeyInfoResult {
            key: key.to_string(),
            exists: false,
            type_name: None,
            ttl: None,
            size: None,
        }
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `rename_key` tool. The source must exist and the target must
/// not; the rename itself is atomic at the store layer.
pub async fn handle_rename_key(ctx: &ServerContext, args: Value) -> Result<Value> {
    ctx.check_rename_permission()?;

    let old_key = require_str(&args, "oldKey")?;
    let new_key = require_str(&args, "newKey")?;

    if !ctx.store.exists(old_key).await? {
        return Err(McpError::NotFound(format!(
            "Key '{}' does not exist",
            old_key
        )));
    }
    if ctx.store.exists(new_key).await? {
        return Err(McpError::Conflict(format!(
            "Key '{}' already exists",
            new_key
        )));
    }

    info!(old_key, new_key, "Renaming key");

    ctx.store.rename(old_key, new_key).await?;

    let result = RenameResult {
        old_key: old_key.to_string(),
        new_key: new_key.to_string(),
        renamed: true,
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `set_ttl` tool
pub async fn handle_set_ttl(ctx: &ServerContext, args: Value) -> Result<Value> {
    let key = require_str(&args, "key")?;
    let ttl = args
        .get("ttl")
        .and_then(Value::as_i64)
        .ok_or_else(|| McpError::InvalidParams("Missing 'ttl' parameter".to_string()))?;
    if ttl <= 0 {
        return Err(McpError::InvalidParams(
            "'ttl' must be a positive integer".to_string(),
        ));
    }

    if !ctx.store.exists(key).await? {
        return Err(McpError::NotFound(format!("Key '{}' does not exist", key)));
    }

    info!(key, ttl, "Setting expiry");

    let set = ctx.store.expire(key, ttl).await?;

    let result = SetTtlResult {
        key: key.to_string(),
        ttl,
        set,
    };
    Ok(serde_json::to_value(result)?)
}

/// Handle the `remove_ttl` tool: clears the expiry so the key persists.
pub async fn handle_remove_ttl(ctx: &ServerContext, args: Value) -> Result<Value> {
    let key = require_str(&args, "key")?;

    if !ctx.store.exists(key).await? {
        return Err(McpError::NotFound(format!("Key '{}' does not exist", key)));
    }

    info!(key, "Removing expiry");

    let removed = ctx.store.persist(key).await?;

    let result = RemoveTtlResult {
        key: key.to_string(),
        ttl_removed: removed,
    };
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::permissions::PermissionPolicy;
    use crate::store::RedisStore;
    use serde_json::json;

    fn context_with(policy: PermissionPolicy) -> ServerContext {
        ServerContext::new(
            RedisStore::new("redis://127.0.0.1:6379"),
            policy,
            AuditLog::in_memory(16),
        )
    }

    #[tokio::test]
    async fn test_create_key_denied_when_flag_disabled() {
        let mut policy = PermissionPolicy::allow_all();
        policy.create = false;
        let ctx = context_with(policy);

        let err = handle_create_key(&ctx, json!({"key": "a", "value": "v"}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Permission(_)));
    }

    #[tokio::test]
    async fn test_drop_key_denied_when_flag_disabled() {
        let mut policy = PermissionPolicy::allow_all();
        policy.drop = false;
        let ctx = context_with(policy);

        let err = handle_drop_key(&ctx, json!({"key": "a"})).await.unwrap_err();
        assert!(matches!(err, McpError::Permission(_)));
    }

    #[tokio::test]
    async fn test_rename_needs_create_and_drop() {
        let mut policy = PermissionPolicy::allow_all();
        policy.create = false;
        let ctx = context_with(policy);

        let err = handle_rename_key(&ctx, json!({"oldKey": "a", "newKey": "b"}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Permission(_)));
        assert!(err.to_string().contains("create and drop"));
    }

    #[tokio::test]
    async fn test_rename_requires_both_key_arguments() {
        let ctx = context_with(PermissionPolicy::allow_all());

        let err = handle_rename_key(&ctx, json!({"oldKey": "a"}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_set_ttl_validates_before_store_access() {
        let ctx = context_with(PermissionPolicy::allow_all());

        let err = handle_set_ttl(&ctx, json!({"key": "a"})).await.unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));

        let err = handle_set_ttl(&ctx, json!({"key": "a", "ttl": -1}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
    }

    // Key lifecycle against a live server; skipped when no Redis is
    // reachable on the default port.
    #[tokio::test]
    async fn test_key_lifecycle_when_redis_available() {
        let ctx = context_with(PermissionPolicy::allow_all());
        if ctx.store.ping().await.is_err() {
            return;
        }

        let key = format!("redis_mcp_key_test:{}", std::process::id());
        let renamed = format!("{}_renamed", key);
        ctx.store.delete(&key).await.unwrap();
        ctx.store.delete(&renamed).await.unwrap();

        let value = handle_create_key(&ctx, json!({"key": key, "value": "v"}))
            .await
            .unwrap();
        assert_eq!(value["created"], json!(true));

        // A second create conflicts and leaves the stored value untouched.
        let err = handle_create_key(&ctx, json!({"key": key, "value": "other"}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Conflict(_)));
        assert_eq!(ctx.store.read_string(&key).await.unwrap().unwrap(), "v");

        let value = handle_set_ttl(&ctx, json!({"key": key, "ttl": 60}))
            .await
            .unwrap();
        assert_eq!(value["set"], json!(true));
        let value = handle_exists_key(&ctx, json!({"key": key})).await.unwrap();
        let ttl = value["ttl"].as_i64().unwrap();
        assert!(ttl > 0 && ttl <= 60);

        let value = handle_remove_ttl(&ctx, json!({"key": key})).await.unwrap();
        assert_eq!(value["ttlRemoved"], json!(true));
        let value = handle_exists_key(&ctx, json!({"key": key})).await.unwrap();
        assert_eq!(value["ttl"], json!("persistent"));

        let value = handle_rename_key(&ctx, json!({"oldKey": key, "newKey": renamed}))
            .await
            .unwrap();
        assert_eq!(value["renamed"], json!(true));

        let value = handle_get_key_info(&ctx, json!({"key": renamed}))
            .await
            .unwrap();
        assert_eq!(value["type"], json!("string"));
        assert_eq!(value["size"], json!(1));

        let value = handle_drop_key(&ctx, json!({"key": renamed})).await.unwrap();
        assert_eq!(value["dropped"], json!(true));
    }

    #[tokio::test]
    async fn test_create_key_requires_value() {
        let ctx = context_with(PermissionPolicy::allow_all());

        let err = handle_create_key(&ctx, json!({"key": "a"})).await.unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
    }
}
