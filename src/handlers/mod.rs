//! Tool handlers
//!
//! One module per operation family. Every handler takes the shared server
//! context and the raw `arguments` object, and returns a serialized typed
//! result. Mutating handlers check their permission flag before touching
//! arguments or the store.

pub mod data_ops;
pub mod info_ops;
pub mod key_ops;
pub mod value_codec;

use crate::error::{McpError, Result};
use serde_json::Value;

/// Extract a required non-empty string argument.
pub(crate) fn require_str<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    let value = args
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidParams(format!("Missing '{}' parameter", name)))?;

    if value.is_empty() {
        return Err(McpError::InvalidParams(format!(
            "'{}' must be a non-empty string",
            name
        )));
    }

    Ok(value)
}

/// Extract an optional string argument, rejecting non-string values.
pub(crate) fn optional_str<'a>(args: &'a Value, name: &str) -> Result<Option<&'a str>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(McpError::InvalidParams(format!(
            "'{}' must be a string",
            name
        ))),
    }
}

/// Extract an optional positive TTL in seconds.
pub(crate) fn optional_ttl(args: &Value) -> Result<Option<i64>> {
    match args.get("ttl") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let ttl = value
                .as_i64()
                .ok_or_else(|| McpError::InvalidParams("'ttl' must be an integer".to_string()))?;
            if ttl <= 0 {
                return Err(McpError::InvalidParams(
                    "'ttl' must be a positive integer".to_string(),
                ));
            }
            Ok(Some(ttl))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_str_rejects_missing_and_empty() {
        assert!(require_str(&json!({}), "key").is_err());
        assert!(require_str(&json!({"key": ""}), "key").is_err());
        assert!(require_str(&json!({"key": 7}), "key").is_err());
        assert_eq!(require_str(&json!({"key": "a"}), "key").unwrap(), "a");
    }

    #[test]
    fn test_optional_str_rejects_non_strings() {
        assert_eq!(optional_str(&json!({}), "pattern").unwrap(), None);
        assert_eq!(
            optional_str(&json!({"pattern": "user:*"}), "pattern").unwrap(),
            Some("user:*")
        );
        assert!(optional_str(&json!({"pattern": 3}), "pattern").is_err());
    }

    #[test]
    fn test_optional_ttl_requires_positive_integer() {
        assert_eq!(optional_ttl(&json!({})).unwrap(), None);
        assert_eq!(optional_ttl(&json!({"ttl": 60})).unwrap(), Some(60));
        assert!(optional_ttl(&json!({"ttl": 0})).is_err());
        assert!(optional_ttl(&json!({"ttl": -5})).is_err());
        assert!(optional_ttl(&json!({"ttl": "60"})).is_err());
    }
}
