//! Redis store adapter
//!
//! Typed wrapper over the `redis` crate's async [`ConnectionManager`]. The
//! handle is created lazily on first use and can be replaced by the health
//! probe; clones held by in-flight operations keep working against the old
//! connection and surface their own failures as operation errors.

use crate::error::{McpError, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Time allowed for establishing the managed connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Redis store adapter
pub struct RedisStore {
    url: String,
    manager: RwLock<Option<ConnectionManager>>,
}

impl RedisStore {
    /// Create an adapter for the given URL. No connection is made until the
    /// first operation needs one.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            manager: RwLock::new(None),
        }
    }

    /// The connection target, for diagnostics.
    pub fn connection_target(&self) -> &str {
        &self.url
    }

    /// Whether a managed connection currently exists.
    pub async fn is_connected(&self) -> bool {
        self.manager.read().await.is_some()
    }

    /// Drop the managed connection.
    pub async fn close(&self) {
        let mut manager = self.manager.write().await;
        if manager.take().is_some() {
            info!("Store connection closed");
        }
    }

    /// Replace the managed connection with a fresh one.
    pub async fn reconnect(&self) -> Result<()> {
        let fresh = self.connect().await?;
        *self.manager.write().await = Some(fresh);
        info!(url = %self.url, "Store connection re-established");
        Ok(())
    }

    /// Get a handle, connecting lazily on first use.
    async fn handle(&self) -> Result<ConnectionManager> {
        if let Some(manager) = self.manager.read().await.as_ref() {
            return Ok(manager.clone());
        }

        let mut slot = self.manager.write().await;
        // Another caller may have connected while we waited for the lock.
        if let Some(manager) = slot.as_ref() {
            return Ok(manager.clone());
        }

        let manager = self.connect().await?;
        *slot = Some(manager.clone());
        info!(url = %self.url, "Store connection established");
        Ok(manager)
    }

    async fn connect(&self) -> Result<ConnectionManager> {
        let client = Client::open(self.url.as_str()).map_err(|e| {
            McpError::Store(format!("Invalid Redis URL '{}': {}", self.url, e))
        })?;

        tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                McpError::Store(format!(
                    "Connection to {} timed out after {:?}",
                    self.url, CONNECT_TIMEOUT
                ))
            })?
            .map_err(|e| McpError::Store(format!("Failed to connect to {}: {}", self.url, e)))
    }

    /// PING the server, verifying the round trip.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.handle().await?;
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| McpError::Store(format!("PING failed: {}", e)))?;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(McpError::Store(format!(
                "PING returned unexpected reply: {}",
                reply
            )))
        }
    }

    /// Health probe used by the background timer: skips unconnected stores
    /// (the handle is lazy) and reconnects after a failed PING.
    pub async fn probe(&self) {
        if !self.is_connected().await {
            debug!("Health probe skipped, store not yet connected");
            return;
        }

        if let Err(e) = self.ping().await {
            warn!(error = %e, "Store health probe failed, reconnecting");
            if let Err(e) = self.reconnect().await {
                warn!(error = %e, "Store reconnect failed");
            }
        }
    }

    // --- existence, type, ttl ---

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.handle().await?;
        conn.exists(key)
            .await
            .map_err(|e| McpError::Store(format!("EXISTS failed for '{}': {}", key, e)))
    }

    /// TYPE introspection. Returns the store's type name ("string", "list",
    /// "set", "hash", ...), or "none" for a missing key.
    pub async fn key_type(&self, key: &str) -> Result<String> {
        let mut conn = self.handle().await?;
        redis::cmd("TYPE")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| McpError::Store(format!("TYPE failed for '{}': {}", key, e)))
    }

    /// Remaining TTL in seconds; -1 when the key persists, -2 when it does
    /// not exist.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.handle().await?;
        conn.ttl(key)
            .await
            .map_err(|e| McpError::Store(format!("TTL failed for '{}': {}", key, e)))
    }

    // --- typed reads ---

    pub async fn read_string(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.handle().await?;
        conn.get(key)
            .await
            .map_err(|e| McpError::Store(format!("GET failed for '{}': {}", key, e)))
    }

    pub async fn read_list(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.handle().await?;
        conn.lrange(key, 0, -1)
            .await
            .map_err(|e| McpError::Store(format!("LRANGE failed for '{}': {}", key, e)))
    }

    pub async fn read_set(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.handle().await?;
        conn.smembers(key)
            .await
            .map_err(|e| McpError::Store(format!("SMEMBERS failed for '{}': {}", key, e)))
    }

    pub async fn read_hash(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let mut conn = self.handle().await?;
        conn.hgetall(key)
            .await
            .map_err(|e| McpError::Store(format!("HGETALL failed for '{}': {}", key, e)))
    }

    // --- typed writes ---

    pub async fn write_string(
        &self,
        key: &str,
        value: &str,
        ttl: Option<i64>,
    ) -> Result<String> {
        let mut conn = self.handle().await?;
        match ttl {
            Some(seconds) => conn
                .set_ex::<_, _, ()>(key, value, seconds as u64)
                .await
                .map_err(|e| McpError::Store(format!("SETEX failed for '{}': {}", key, e)))?,
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| McpError::Store(format!("SET failed for '{}': {}", key, e)))?,
        }
        Ok("OK".to_string())
    }

    /// Replace the list at `key`. Clear-then-write: not atomic against
    /// concurrent external writers, acceptable under the single-client model.
    pub async fn write_list(&self, key: &str, items: &[String], ttl: Option<i64>) -> Result<i64> {
        let mut conn = self.handle().await?;
        conn.del::<_, i64>(key)
            .await
            .map_err(|e| McpError::Store(format!("DEL failed for '{}': {}", key, e)))?;

        let pushed: i64 = conn
            .rpush(key, items)
            .await
            .map_err(|e| McpError::Store(format!("RPUSH failed for '{}': {}", key, e)))?;

        self.apply_ttl(&mut conn, key, ttl).await?;
        Ok(pushed)
    }

    /// Replace the set at `key`. Empty member lists delete the key without
    /// recreating it: a set with no members does not exist.
    pub async fn write_set(&self, key: &str, items: &[String], ttl: Option<i64>) -> Result<i64> {
        let mut conn = self.handle().await?;
        conn.del::<_, i64>(key)
            .await
            .map_err(|e| McpError::Store(format!("DEL failed for '{}': {}", key, e)))?;

        if items.is_empty() {
            return Ok(0);
        }

        let added: i64 = conn
            .sadd(key, items)
            .await
            .map_err(|e| McpError::Store(format!("SADD failed for '{}': {}", key, e)))?;

        self.apply_ttl(&mut conn, key, ttl).await?;
        Ok(added)
    }

    /// Replace the hash at `key`.
    pub async fn write_hash(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Option<i64>,
    ) -> Result<i64> {
        let mut conn = self.handle().await?;
        conn.del::<_, i64>(key)
            .await
            .map_err(|e| McpError::Store(format!("DEL failed for '{}': {}", key, e)))?;

        if fields.is_empty() {
            return Ok(0);
        }

        conn.hset_multiple::<_, _, _, ()>(key, fields)
            .await
            .map_err(|e| McpError::Store(format!("HSET failed for '{}': {}", key, e)))?;

        self.apply_ttl(&mut conn, key, ttl).await?;
        Ok(fields.len() as i64)
    }

    async fn apply_ttl(
        &self,
        conn: &mut ConnectionManager,
        key: &str,
        ttl: Option<i64>,
    ) -> Result<()> {
        if let Some(seconds) = ttl {
            conn.expire::<_, bool>(key, seconds)
                .await
                .map_err(|e| McpError::Store(format!("EXPIRE failed for '{}': {}", key, e)))?;
        }
        Ok(())
    }

    // --- key management ---

    /// DEL. Returns the number of keys removed (0 or 1 here).
    pub async fn delete(&self, key: &str) -> Result<i64> {
        let mut conn = self.handle().await?;
        conn.del(key)
            .await
            .map_err(|e| McpError::Store(format!("DEL failed for '{}': {}", key, e)))
    }

    /// KEYS pattern enumeration.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.handle().await?;
        conn.keys(pattern)
            .await
            .map_err(|e| McpError::Store(format!("KEYS failed for '{}': {}", pattern, e)))
    }

    /// Atomic RENAME at the store layer.
    pub async fn rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        let mut conn = self.handle().await?;
        let _: () = conn.rename(old_key, new_key).await.map_err(|e| {
            McpError::Store(format!("RENAME failed for '{}': {}", old_key, e))
        })?;
        Ok(())
    }

    /// EXPIRE. True when the timeout was set.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        let mut conn = self.handle().await?;
        conn.expire(key, seconds)
            .await
            .map_err(|e| McpError::Store(format!("EXPIRE failed for '{}': {}", key, e)))
    }

    /// PERSIST. True when an expiry was removed.
    pub async fn persist(&self, key: &str) -> Result<bool> {
        let mut conn = self.handle().await?;
        conn.persist(key)
            .await
            .map_err(|e| McpError::Store(format!("PERSIST failed for '{}': {}", key, e)))
    }

    // --- sizes ---

    pub async fn string_len(&self, key: &str) -> Result<i64> {
        let mut conn = self.handle().await?;
        conn.strlen(key)
            .await
            .map_err(|e| McpError::Store(format!("STRLEN failed for '{}': {}", key, e)))
    }

    pub async fn list_len(&self, key: &str) -> Result<i64> {
        let mut conn = self.handle().await?;
        conn.llen(key)
            .await
            .map_err(|e| McpError::Store(format!("LLEN failed for '{}': {}", key, e)))
    }

    pub async fn set_card(&self, key: &str) -> Result<i64> {
        let mut conn = self.handle().await?;
        conn.scard(key)
            .await
            .map_err(|e| McpError::Store(format!("SCARD failed for '{}': {}", key, e)))
    }

    pub async fn hash_len(&self, key: &str) -> Result<i64> {
        let mut conn = self.handle().await?;
        conn.hlen(key)
            .await
            .map_err(|e| McpError::Store(format!("HLEN failed for '{}': {}", key, e)))
    }

    // --- diagnostics ---

    pub async fn dbsize(&self) -> Result<i64> {
        let mut conn = self.handle().await?;
        redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(|e| McpError::Store(format!("DBSIZE failed: {}", e)))
    }

    /// Raw INFO text for one section.
    pub async fn info(&self, section: &str) -> Result<String> {
        let mut conn = self.handle().await?;
        redis::cmd("INFO")
            .arg(section)
            .query_async(&mut conn)
            .await
            .map_err(|e| McpError::Store(format!("INFO {} failed: {}", section, e)))
    }
}

/// Parse INFO output into a flat `key: value` mapping, skipping section
/// headers and blank lines.
pub fn parse_info(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            line.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Parse one keyspace value such as `keys=2,expires=1,avg_ttl=0` into its
/// component fields.
pub fn parse_keyspace_fields(value: &str) -> BTreeMap<String, String> {
    value
        .split(',')
        .filter_map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_skips_headers_and_blanks() {
        let text = "# Server\r\nredis_version:7.2.4\r\nredis_mode:standalone\r\n\r\ntcp_port:6379\r\n";
        let fields = parse_info(text);

        assert_eq!(fields.get("redis_version").unwrap(), "7.2.4");
        assert_eq!(fields.get("redis_mode").unwrap(), "standalone");
        assert_eq!(fields.get("tcp_port").unwrap(), "6379");
        assert!(!fields.contains_key("# Server"));
    }

    #[test]
    fn test_parse_info_keeps_colons_in_values() {
        let fields = parse_info("executable:/usr/bin/redis-server\nconfig_file:\n");
        assert_eq!(fields.get("executable").unwrap(), "/usr/bin/redis-server");
        assert_eq!(fields.get("config_file").unwrap(), "");
    }

    #[test]
    fn test_parse_keyspace_fields() {
        let fields = parse_keyspace_fields("keys=42,expires=3,avg_ttl=1200");
        assert_eq!(fields.get("keys").unwrap(), "42");
        assert_eq!(fields.get("expires").unwrap(), "3");
        assert_eq!(fields.get("avg_ttl").unwrap(), "1200");
    }

    // Round-trip coverage against a live server; skipped when no Redis is
    // reachable on the default port.
    #[tokio::test]
    async fn test_store_round_trip_when_redis_available() {
        let store = RedisStore::new("redis://127.0.0.1:6379");
        if store.ping().await.is_err() {
            return;
        }

        let key = format!("redis_mcp_test:{}", std::process::id());

        store
            .write_string(&key, "hello", Some(60))
            .await
            .unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.key_type(&key).await.unwrap(), "string");
        assert_eq!(store.read_string(&key).await.unwrap().unwrap(), "hello");

        let ttl = store.ttl(&key).await.unwrap();
        assert!(ttl > 0 && ttl <= 60);

        store.persist(&key).await.unwrap();
        assert_eq!(store.ttl(&key).await.unwrap(), -1);

        assert_eq!(store.delete(&key).await.unwrap(), 1);
        assert!(!store.exists(&key).await.unwrap());
    }
}
