//! Stdio transport for JSON-RPC messages
//!
//! Line-delimited JSON over stdin/stdout. The transport hands raw lines to
//! the caller rather than parsing them itself: a malformed line must still
//! yield a synthetic `id: null` error response on stdout, and only the
//! dispatcher loop knows how to build one.

use super::JsonRpcResponse;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

/// Stdio transport for JSON-RPC messages
///
/// Reads one message per input line and writes one JSON object per response
/// line. Blank lines are skipped. Log output must go to stderr; stdout
/// carries nothing but responses.
pub struct StdioTransport {
    stdin: BufReader<io::Stdin>,
    stdout: io::Stdout,
}

impl StdioTransport {
    /// Create a new stdio transport
    pub fn new() -> Self {
        Self {
            stdin: BufReader::new(io::stdin()),
            stdout: io::stdout(),
        }
    }

    /// Read the next non-empty input line.
    ///
    /// Returns `None` on EOF (client disconnected).
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let mut line = String::new();

            let n = self.stdin.read_line(&mut line).await?;
            if n == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(line = %trimmed, "Received input line");
            return Ok(Some(trimmed.to_string()));
        }
    }

    /// Write a JSON-RPC response to stdout as a single line, then flush so
    /// the client sees it before the next request is processed.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )
        })?;

        debug!(response = %json, "Sending JSON-RPC response");

        self.stdout.write_all(json.as_bytes()).await?;
        self.stdout.write_all(b"\n").await?;
        self.stdout.flush().await?;

        Ok(())
    }

    /// Flush any buffered output before shutdown.
    pub async fn close(&mut self) -> io::Result<()> {
        self.stdout.flush().await?;
        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::{JsonRpcError, JsonRpcResponse, RequestId};

    #[test]
    fn test_response_serializes_to_single_line() {
        let resp = JsonRpcResponse::success(
            RequestId::Number(1),
            serde_json::json!({"key": "user:1", "exists": true}),
        );

        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"exists\":true"));
    }

    #[test]
    fn test_parse_failure_response_shape() {
        // The serve loop answers unparseable lines with id: null and -32603.
        let resp = JsonRpcResponse::error(
            None,
            JsonRpcError::internal_error("Failed to parse request: expected value"),
        );

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"id\":null"));
        assert!(json.contains("-32603"));
        assert!(!json.contains("\"result\""));
    }
}
