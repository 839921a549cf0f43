//! Server context
//!
//! Shared state handed to every tool handler: the store adapter, the
//! immutable permission policy, and the audit log.

use crate::audit::AuditLog;
use crate::error::{McpError, Result};
use crate::permissions::{Action, PermissionPolicy};
use crate::store::RedisStore;
use std::sync::Arc;

/// Shared server context
pub struct ServerContext {
    /// Store adapter (shared with the health probe and shutdown paths)
    pub store: Arc<RedisStore>,

    /// Permission policy, immutable for the process lifetime
    pub policy: PermissionPolicy,

    /// Audit log observing every dispatch
    pub audit: AuditLog,
}

impl ServerContext {
    /// Create a new server context
    pub fn new(store: RedisStore, policy: PermissionPolicy, audit: AuditLog) -> Self {
        Self {
            store: Arc::new(store),
            policy,
            audit,
        }
    }

    /// Permission gate. Mutating operations call this before any argument
    /// validation or store access.
    pub fn check_permission(&self, action: Action) -> Result<()> {
        if self.policy.allows(action) {
            Ok(())
        } else {
            Err(McpError::Permission(format!(
                "{} operations are disabled",
                action.name()
            )))
        }
    }

    /// Permission gate for `rename_key`, which needs create and drop.
    pub fn check_rename_permission(&self) -> Result<()> {
        if self.policy.rename_allowed() {
            Ok(())
        } else {
            Err(McpError::Permission(
                "rename requires both create and drop permissions".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;

    fn context_with(policy: PermissionPolicy) -> ServerContext {
        ServerContext::new(
            RedisStore::new("redis://127.0.0.1:6379"),
            policy,
            AuditLog::in_memory(16),
        )
    }

    #[test]
    fn test_check_permission_allows_by_default() {
        let ctx = context_with(PermissionPolicy::allow_all());
        assert!(ctx.check_permission(Action::Insert).is_ok());
        assert!(ctx.check_rename_permission().is_ok());
    }

    #[test]
    fn test_check_permission_denial_message_is_fixed() {
        let mut policy = PermissionPolicy::allow_all();
        policy.delete = false;
        let ctx = context_with(policy);

        let err = ctx.check_permission(Action::Delete).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Permission denied: delete operations are disabled"
        );
    }

    #[test]
    fn test_rename_gate_requires_both_flags() {
        let mut policy = PermissionPolicy::allow_all();
        policy.drop = false;
        let ctx = context_with(policy);

        assert!(ctx.check_permission(Action::Create).is_ok());
        assert!(ctx.check_rename_permission().is_err());
    }
}
