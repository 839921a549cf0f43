//! MCP tool definitions and the permission-filtered manifest

use crate::permissions::PermissionPolicy;
use serde::Serialize;
use serde_json::{json, Value};

/// Tool definition for MCP
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Build the capability manifest for the given policy.
///
/// Membership is a pure function of the five flags: read-only and TTL tools
/// are always present, each mutating tool appears only when its flag is
/// true, and `rename_key` needs create and drop together. Rebuilt on every
/// call; the manifest is never cached.
pub fn get_all_tools(policy: &PermissionPolicy) -> Vec<ToolDefinition> {
    let mut tools = vec![tool_get()];

    if policy.insert {
        tools.push(tool_set());
    }
    if policy.update {
        tools.push(tool_update());
    }
    if policy.delete {
        tools.push(tool_delete());
    }

    tools.push(tool_list_keys());

    if policy.create {
        tools.push(tool_create_key());
    }
    if policy.drop {
        tools.push(tool_drop_key());
    }

    tools.push(tool_exists_key());
    tools.push(tool_get_key_info());

    if policy.rename_allowed() {
        tools.push(tool_rename_key());
    }

    tools.push(tool_set_ttl());
    tools.push(tool_remove_ttl());
    tools.push(tool_server_info());
    tools.push(tool_db_stats());
    tools.push(tool_memory_info());
    tools.push(tool_test_connection());

    tools
}

fn key_only_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "key": {
                "type": "string",
                "description": description,
                "minLength": 1
            }
        },
        "required": ["key"]
    })
}

fn write_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "key": {
                "type": "string",
                "description": "Key to write",
                "minLength": 1
            },
            "value": {
                "description": "Value to store. Arrays replace list/set contents, objects become hash fields."
            },
            "type": {
                "type": "string",
                "description": "Container type (default: string)",
                "enum": ["string", "list", "set", "hash"]
            },
            "ttl": {
                "type": "integer",
                "description": "Expiry in seconds",
                "minimum": 1
            }
        },
        "required": ["key", "value"]
    })
}

fn tool_get() -> ToolDefinition {
    ToolDefinition {
        name: "get".to_string(),
        description: "Read a value with its type and remaining TTL. Reports exists=false for missing keys.".to_string(),
        input_schema: key_only_schema("Key to read"),
    }
}

fn tool_set() -> ToolDefinition {
    ToolDefinition {
        name: "set".to_string(),
        description: "Write a value as string, list, set or hash, optionally with a TTL. Replaces any existing value.".to_string(),
        input_schema: write_schema(),
    }
}

fn tool_update() -> ToolDefinition {
    ToolDefinition {
        name: "update".to_string(),
        description: "Replace the value of an existing key. Fails if the key does not exist.".to_string(),
        input_schema: write_schema(),
    }
}

fn tool_delete() -> ToolDefinition {
    ToolDefinition {
        name: "delete".to_string(),
        description: "Delete a value. Deleting a missing key reports deleted=false.".to_string(),
        input_schema: key_only_schema("Key to delete"),
    }
}

fn tool_list_keys() -> ToolDefinition {
    ToolDefinition {
        name: "list_keys".to_string(),
        description: "List keys matching a glob pattern with pagination; each key is annotated with its type and TTL.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern (default: *)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum keys per page (default: 100)",
                    "minimum": 1,
                    "maximum": 10000
                },
                "offset": {
                    "type": "integer",
                    "description": "Keys to skip (default: 0)",
                    "minimum": 0
                }
            }
        }),
    }
}

fn tool_create_key() -> ToolDefinition {
    ToolDefinition {
        name: "create_key".to_string(),
        description: "Create a new key. Fails if the key already exists.".to_string(),
        input_schema: write_schema(),
    }
}

fn tool_drop_key() -> ToolDefinition {
    ToolDefinition {
        name: "drop_key".to_string(),
        description: "Drop a key regardless of its type.".to_string(),
        input_schema: key_only_schema("Key to drop"),
    }
}

fn tool_exists_key() -> ToolDefinition {
    ToolDefinition {
        name: "exists_key".to_string(),
        description: "Check whether a key exists, reporting its type and TTL.".to_string(),
        input_schema: key_only_schema("Key to check"),
    }
}

fn tool_get_key_info() -> ToolDefinition {
    ToolDefinition {
        name: "get_key_info".to_string(),
        description: "Inspect a key: existence, type, TTL, and size (length or cardinality).".to_string(),
        input_schema: key_only_schema("Key to inspect"),
    }
}

fn tool_rename_key() -> ToolDefinition {
    ToolDefinition {
        name: "rename_key".to_string(),
        description: "Atomically rename a key. The source must exist and the target must not.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "oldKey": {
                    "type": "string",
                    "description": "Current key name",
                    "minLength": 1
                },
                "newKey": {
                    "type": "string",
                    "description": "New key name",
                    "minLength": 1
                }
            },
            "required": ["oldKey", "newKey"]
        }),
    }
}

fn tool_set_ttl() -> ToolDefinition {
    ToolDefinition {
        name: "set_ttl".to_string(),
        description: "Set an expiry on an existing key.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "key": {
                    "type": "string",
                    "description": "Key to expire",
                    "minLength": 1
                },
                "ttl": {
                    "type": "integer",
                    "description": "Expiry in seconds",
                    "minimum": 1
                }
            },
            "required": ["key", "ttl"]
        }),
    }
}

fn tool_remove_ttl() -> ToolDefinition {
    ToolDefinition {
        name: "remove_ttl".to_string(),
        description: "Remove the expiry from a key so it persists.".to_string(),
        input_schema: key_only_schema("Key to persist"),
    }
}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

fn tool_server_info() -> ToolDefinition {
    ToolDefinition {
        name: "server_info".to_string(),
        description: "Summarize the store server: version, mode, OS, port, uptime.".to_string(),
        input_schema: empty_schema(),
    }
}

fn tool_db_stats() -> ToolDefinition {
    ToolDefinition {
        name: "db_stats".to_string(),
        description: "Keyspace statistics: total keys and per-database counters.".to_string(),
        input_schema: empty_schema(),
    }
}

fn tool_memory_info() -> ToolDefinition {
    ToolDefinition {
        name: "memory_info".to_string(),
        description: "Memory usage: current, peak, and eviction policy.".to_string(),
        input_schema: empty_schema(),
    }
}

fn tool_test_connection() -> ToolDefinition {
    ToolDefinition {
        name: "test_connection".to_string(),
        description: "Probe store connectivity. Never fails; problems are reported in the result.".to_string(),
        input_schema: empty_schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::KNOWN_TOOLS;

    fn names(policy: &PermissionPolicy) -> Vec<String> {
        get_all_tools(policy).into_iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_full_manifest_matches_dispatch_table() {
        let all = names(&PermissionPolicy::allow_all());
        assert_eq!(all, KNOWN_TOOLS);
    }

    #[test]
    fn test_each_flag_gates_exactly_its_tool() {
        let cases: [(&str, fn(&mut PermissionPolicy)); 5] = [
            ("set", |p| p.insert = false),
            ("update", |p| p.update = false),
            ("delete", |p| p.delete = false),
            ("create_key", |p| p.create = false),
            ("drop_key", |p| p.drop = false),
        ];

        for (tool, disable) in cases {
            let mut policy = PermissionPolicy::allow_all();
            disable(&mut policy);

            let full = names(&PermissionPolicy::allow_all());
            let gated = names(&policy);

            assert!(!gated.contains(&tool.to_string()), "{} still listed", tool);

            // Only the gated tool (and rename when its inputs go away)
            // may disappear.
            let missing: Vec<_> = full
                .iter()
                .filter(|name| !gated.contains(name))
                .collect();
            for name in missing {
                assert!(
                    name == tool || name == "rename_key",
                    "unexpected tool removed: {}",
                    name
                );
            }
        }
    }

    #[test]
    fn test_rename_listed_iff_create_and_drop() {
        let rename = "rename_key".to_string();

        assert!(names(&PermissionPolicy::allow_all()).contains(&rename));

        let mut no_create = PermissionPolicy::allow_all();
        no_create.create = false;
        assert!(!names(&no_create).contains(&rename));

        let mut no_drop = PermissionPolicy::allow_all();
        no_drop.drop = false;
        assert!(!names(&no_drop).contains(&rename));
    }

    #[test]
    fn test_unconditional_tools_survive_full_lockdown() {
        let locked = PermissionPolicy {
            insert: false,
            update: false,
            delete: false,
            create: false,
            drop: false,
        };
        let listed = names(&locked);

        for tool in [
            "get",
            "list_keys",
            "exists_key",
            "get_key_info",
            "set_ttl",
            "remove_ttl",
            "server_info",
            "db_stats",
            "memory_info",
            "test_connection",
        ] {
            assert!(listed.contains(&tool.to_string()), "{} missing", tool);
        }
        assert_eq!(listed.len(), 10);
    }

    #[test]
    fn test_schemas_declare_required_arguments() {
        for tool in get_all_tools(&PermissionPolicy::allow_all()) {
            match tool.name.as_str() {
                "set" | "update" | "create_key" => {
                    assert_eq!(
                        tool.input_schema["required"],
                        serde_json::json!(["key", "value"])
                    );
                }
                "rename_key" => {
                    assert_eq!(
                        tool.input_schema["required"],
                        serde_json::json!(["oldKey", "newKey"])
                    );
                }
                _ => {}
            }
        }
    }
}
