//! Audit log
//!
//! Append-only record of every dispatch attempt and its outcome. Entries go
//! to a bounded in-memory ring (most-recent-first) and, when a log path is
//! configured, to a durable JSON-lines file. Recording never raises to the
//! dispatcher; append failures are logged and dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Default in-memory window size.
pub const DEFAULT_RING_CAPACITY: usize = 1000;

/// One dispatch attempt and its outcome. Immutable after creation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Monotonic entry id
    pub id: u64,

    /// RPC method, or `tools/call:<tool>` for tool invocations
    pub operation: String,

    /// Compact serialization of the parameters or tool arguments
    pub params: String,

    /// Compact serialization of the result, if the dispatch succeeded
    pub result: Option<String>,

    /// Error message, if the dispatch failed
    pub error: Option<String>,

    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Audit log: bounded ring plus optional durable file.
pub struct AuditLog {
    next_id: AtomicU64,
    capacity: usize,
    ring: Mutex<VecDeque<AuditEntry>>,
    file: tokio::sync::Mutex<Option<File>>,
}

impl AuditLog {
    /// Ring-only log, no durable file.
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            capacity,
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            file: tokio::sync::Mutex::new(None),
        }
    }

    /// Log backed by an append-mode file. If the file cannot be opened the
    /// server still runs with the in-memory window only.
    pub async fn with_file(path: &Path, capacity: usize) -> Self {
        let log = Self::in_memory(capacity);

        match OpenOptions::new().create(true).append(true).open(path).await {
            Ok(file) => {
                *log.file.lock().await = Some(file);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open audit log file");
            }
        }

        log
    }

    /// Record one dispatch outcome. Called exactly once per dispatch, before
    /// the response is emitted. Never fails.
    pub async fn record(
        &self,
        operation: &str,
        params: &str,
        result: Option<String>,
        error: Option<String>,
    ) {
        let entry = AuditEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            operation: operation.to_string(),
            params: params.to_string(),
            result,
            error,
            timestamp: Utc::now(),
        };

        {
            // Recording never raises, so a poisoned lock is recovered
            // rather than propagated.
            let mut ring = self.ring.lock().unwrap_or_else(|p| p.into_inner());
            ring.push_front(entry.clone());
            ring.truncate(self.capacity);
        }

        let mut file = self.file.lock().await;
        if let Some(file) = file.as_mut() {
            match serde_json::to_string(&entry) {
                Ok(mut line) => {
                    line.push('\n');
                    if let Err(e) = file.write_all(line.as_bytes()).await {
                        warn!(error = %e, "Failed to append audit entry");
                    } else if let Err(e) = file.flush().await {
                        warn!(error = %e, "Failed to flush audit log");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to serialize audit entry"),
            }
        }
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, count: usize) -> Vec<AuditEntry> {
        let ring = self.ring.lock().unwrap_or_else(|p| p.into_inner());
        ring.iter().take(count).cloned().collect()
    }

    /// Number of entries currently retained in the ring.
    pub fn len(&self) -> usize {
        self.ring
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    /// True when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ring_is_most_recent_first() {
        let log = AuditLog::in_memory(8);

        log.record("ping", "null", Some("{\"pong\":true}".into()), None)
            .await;
        log.record("tools/list", "null", Some("{}".into()), None).await;

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].operation, "tools/list");
        assert_eq!(recent[1].operation, "ping");
        assert!(recent[0].id > recent[1].id);
    }

    #[tokio::test]
    async fn test_ring_evicts_oldest_at_capacity() {
        let log = AuditLog::in_memory(3);

        for i in 0..5 {
            log.record(&format!("op{}", i), "null", None, None).await;
        }

        let recent = log.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].operation, "op4");
        assert_eq!(recent[2].operation, "op2");
    }

    #[tokio::test]
    async fn test_failed_dispatch_records_error() {
        let log = AuditLog::in_memory(8);

        log.record(
            "tools/call:get",
            "{\"key\":\"\"}",
            None,
            Some("Invalid parameters: 'key' must be a non-empty string".into()),
        )
        .await;

        let recent = log.recent(1);
        assert!(recent[0].result.is_none());
        assert!(recent[0].error.as_deref().unwrap().contains("Invalid parameters"));
    }

    #[tokio::test]
    async fn test_durable_log_is_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let log = AuditLog::with_file(&path, 8).await;
        log.record("ping", "null", Some("{\"pong\":true}".into()), None)
            .await;
        log.record(
            "tools/call:get",
            "{\"key\":\"user:1\"}",
            None,
            Some("Store error: connection refused".into()),
        )
        .await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value["id"].is_u64());
            assert!(value["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn test_unopenable_file_degrades_to_ring_only() {
        let dir = tempfile::tempdir().unwrap();

        // A directory path cannot be opened for append; recording must
        // still work against the ring.
        let log = AuditLog::with_file(dir.path(), 8).await;
        log.record("ping", "null", None, None).await;
        assert_eq!(log.len(), 1);
    }
}
