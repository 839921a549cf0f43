//! Shared value and TTL conventions for the data and key operations
//!
//! The store holds four container types. Arguments select one with a `type`
//! field; JSON values are converted to store elements here so every write
//! path shares one dispatch policy.

use crate::error::{McpError, Result};
use crate::store::RedisStore;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Container types accepted by `set`, `update` and `create_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    List,
    Set,
    Hash,
}

impl ValueKind {
    /// Parse the requested type, defaulting to `string`.
    pub fn parse(requested: Option<&str>) -> Result<Self> {
        match requested.unwrap_or("string") {
            "string" => Ok(ValueKind::String),
            "list" => Ok(ValueKind::List),
            "set" => Ok(ValueKind::Set),
            "hash" => Ok(ValueKind::Hash),
            other => Err(McpError::InvalidParams(format!(
                "Unsupported type '{}': expected string, list, set or hash",
                other
            ))),
        }
    }

    /// Map a store TYPE reply onto a kind, for read dispatch.
    pub fn from_store_type(type_name: &str) -> Option<Self> {
        match type_name {
            "string" => Some(ValueKind::String),
            "list" => Some(ValueKind::List),
            "set" => Some(ValueKind::Set),
            "hash" => Some(ValueKind::Hash),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Set => "set",
            ValueKind::Hash => "hash",
        }
    }
}

impl Serialize for ValueKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// TTL reporting convention: a positive remaining time serializes as the
/// number of seconds, no expiry as `"persistent"`, and a key that vanished
/// between checks as `"expired"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    Seconds(i64),
    Persistent,
    Expired,
}

impl TtlState {
    /// Interpret a store TTL reply (-1 persists, -2 already gone).
    pub fn from_store(ttl: i64) -> Self {
        match ttl {
            -1 => TtlState::Persistent,
            -2 => TtlState::Expired,
            seconds => TtlState::Seconds(seconds),
        }
    }
}

impl Serialize for TtlState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TtlState::Seconds(seconds) => serializer.serialize_i64(*seconds),
            TtlState::Persistent => serializer.serialize_str("persistent"),
            TtlState::Expired => serializer.serialize_str("expired"),
        }
    }
}

/// Render one JSON value as a store element. Strings pass through; anything
/// else keeps its compact JSON form.
pub fn element_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Elements for a list write. Arrays are written as the full replacement
/// collection, scalars as a single element. An empty array yields a single
/// empty-string placeholder: a list with no elements cannot exist in the
/// store, and callers expect the key to survive the write.
pub fn list_elements(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) if items.is_empty() => vec![String::new()],
        Value::Array(items) => items.iter().map(element_text).collect(),
        scalar => vec![element_text(scalar)],
    }
}

/// Members for a set write. Arrays replace the whole set, scalars become a
/// single member. Empty arrays yield no members (the key will not exist).
pub fn set_members(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(element_text).collect(),
        scalar => vec![element_text(scalar)],
    }
}

/// Field pairs for a hash write; the value must be object-shaped.
pub fn hash_fields(value: &Value) -> Result<Vec<(String, String)>> {
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), element_text(v)))
            .collect()),
        _ => Err(McpError::InvalidParams(
            "'value' must be an object when type is 'hash'".to_string(),
        )),
    }
}

/// Type-dispatched write shared by `set`, `update` and `create_key`.
/// Validation of the value shape happens before any store access. Returns
/// the store acknowledgement for the result field.
pub async fn write_typed(
    store: &RedisStore,
    key: &str,
    value: &Value,
    kind: ValueKind,
    ttl: Option<i64>,
) -> Result<Value> {
    match kind {
        ValueKind::String => {
            let text = element_text(value);
            let reply = store.write_string(key, &text, ttl).await?;
            Ok(Value::String(reply))
        }
        ValueKind::List => {
            let items = list_elements(value);
            let pushed = store.write_list(key, &items, ttl).await?;
            Ok(Value::from(pushed))
        }
        ValueKind::Set => {
            let members = set_members(value);
            let added = store.write_set(key, &members, ttl).await?;
            Ok(Value::from(added))
        }
        ValueKind::Hash => {
            let fields = hash_fields(value)?;
            let stored = store.write_hash(key, &fields, ttl).await?;
            Ok(Value::from(stored))
        }
    }
}

/// Type-dispatched read for `get`. The key is known to exist; its stored
/// type selects the primitive.
pub async fn read_typed(store: &RedisStore, key: &str, type_name: &str) -> Result<Value> {
    let kind = ValueKind::from_store_type(type_name).ok_or_else(|| {
        McpError::Store(format!(
            "Unsupported value type '{}' for key '{}'",
            type_name, key
        ))
    })?;

    match kind {
        ValueKind::String => Ok(store
            .read_string(key)
            .await?
            .map(Value::String)
            .unwrap_or(Value::Null)),
        ValueKind::List => Ok(Value::Array(
            store
                .read_list(key)
                .await?
                .into_iter()
                .map(Value::String)
                .collect(),
        )),
        ValueKind::Set => Ok(Value::Array(
            store
                .read_set(key)
                .await?
                .into_iter()
                .map(Value::String)
                .collect(),
        )),
        ValueKind::Hash => {
            let map = store.read_hash(key).await?;
            Ok(Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ))
        }
    }
}

/// Type-dispatched size for `get_key_info`: length for strings and lists,
/// cardinality for sets, field count for hashes. Unknown container types
/// report no size.
pub async fn size_of(store: &RedisStore, key: &str, type_name: &str) -> Result<Option<i64>> {
    let size = match ValueKind::from_store_type(type_name) {
        Some(ValueKind::String) => Some(store.string_len(key).await?),
        Some(ValueKind::List) => Some(store.list_len(key).await?),
        Some(ValueKind::Set) => Some(store.set_card(key).await?),
        Some(ValueKind::Hash) => Some(store.hash_len(key).await?),
        None => None,
    };
    Ok(size)
}
