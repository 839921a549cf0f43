//! Permission policy
//!
//! Five independent boolean flags gating the mutating operations. Flags are
//! read once at startup and never change for the lifetime of the process.

use serde_json::{json, Value};
use std::env;
use tracing::info;

/// Environment variables controlling the five flags. A flag is disabled only
/// when its variable is set to exactly `false`; any other value, or an unset
/// variable, leaves it allowed.
pub const ALLOW_INSERT_VAR: &str = "REDIS_MCP_ALLOW_INSERT";
pub const ALLOW_UPDATE_VAR: &str = "REDIS_MCP_ALLOW_UPDATE";
pub const ALLOW_DELETE_VAR: &str = "REDIS_MCP_ALLOW_DELETE";
pub const ALLOW_CREATE_VAR: &str = "REDIS_MCP_ALLOW_CREATE";
pub const ALLOW_DROP_VAR: &str = "REDIS_MCP_ALLOW_DROP";

/// A gated action, one per permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write a value to a new or existing key (`set`)
    Insert,
    /// Replace the value of an existing key (`update`)
    Update,
    /// Remove a value (`delete`)
    Delete,
    /// Create a key that must not already exist (`create_key`)
    Create,
    /// Drop a key (`drop_key`)
    Drop,
}

impl Action {
    /// Name used in denial messages and the diagnostics echo.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Create => "create",
            Action::Drop => "drop",
        }
    }
}

/// Immutable permission policy
///
/// Constructed once at process start and injected by reference into every
/// component that needs it; there are no ambient lookups after startup.
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    /// Allow `set`
    pub insert: bool,
    /// Allow `update`
    pub update: bool,
    /// Allow `delete`
    pub delete: bool,
    /// Allow `create_key`
    pub create: bool,
    /// Allow `drop_key`
    pub drop: bool,
}

impl PermissionPolicy {
    /// Policy with every action allowed (the default when no environment
    /// variables are set).
    pub fn allow_all() -> Self {
        Self {
            insert: true,
            update: true,
            delete: true,
            create: true,
            drop: true,
        }
    }

    /// Read the policy from the environment.
    pub fn from_env() -> Self {
        let policy = Self {
            insert: flag_enabled(env::var(ALLOW_INSERT_VAR).ok().as_deref()),
            update: flag_enabled(env::var(ALLOW_UPDATE_VAR).ok().as_deref()),
            delete: flag_enabled(env::var(ALLOW_DELETE_VAR).ok().as_deref()),
            create: flag_enabled(env::var(ALLOW_CREATE_VAR).ok().as_deref()),
            drop: flag_enabled(env::var(ALLOW_DROP_VAR).ok().as_deref()),
        };

        info!(
            insert = policy.insert,
            update = policy.update,
            delete = policy.delete,
            create = policy.create,
            drop = policy.drop,
            "Loaded permission policy"
        );

        policy
    }

    /// Check whether an action is allowed.
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Insert => self.insert,
            Action::Update => self.update,
            Action::Delete => self.delete,
            Action::Create => self.create,
            Action::Drop => self.drop,
        }
    }

    /// `rename_key` needs to both create the target and drop the source.
    pub fn rename_allowed(&self) -> bool {
        self.create && self.drop
    }

    /// Diagnostic echo of the flags, included in `tools/list`.
    pub fn summary(&self) -> Value {
        json!({
            "insert": self.insert,
            "update": self.update,
            "delete": self.delete,
            "create": self.create,
            "drop": self.drop,
        })
    }
}

/// A flag stays enabled unless its input is exactly `"false"`.
fn flag_enabled(value: Option<&str>) -> bool {
    value != Some("false")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_disabled_only_by_exact_false() {
        assert!(flag_enabled(None));
        assert!(flag_enabled(Some("true")));
        assert!(flag_enabled(Some("0")));
        assert!(flag_enabled(Some("no")));
        assert!(flag_enabled(Some("FALSE")));
        assert!(!flag_enabled(Some("false")));
    }

    #[test]
    fn test_allows_matches_flags() {
        let policy = PermissionPolicy {
            insert: true,
            update: false,
            delete: true,
            create: false,
            drop: true,
        };

        assert!(policy.allows(Action::Insert));
        assert!(!policy.allows(Action::Update));
        assert!(policy.allows(Action::Delete));
        assert!(!policy.allows(Action::Create));
        assert!(policy.allows(Action::Drop));
    }

    #[test]
    fn test_rename_requires_create_and_drop() {
        let mut policy = PermissionPolicy::allow_all();
        assert!(policy.rename_allowed());

        policy.create = false;
        assert!(!policy.rename_allowed());

        policy.create = true;
        policy.drop = false;
        assert!(!policy.rename_allowed());
    }

    #[test]
    fn test_summary_echoes_every_flag() {
        let policy = PermissionPolicy::allow_all();
        let summary = policy.summary();

        for flag in ["insert", "update", "delete", "create", "drop"] {
            assert_eq!(summary[flag], serde_json::json!(true));
        }
    }
}
