//! MCP client over newline-delimited JSON-RPC
//!
//! One request in flight at a time: `request` writes a line and waits for
//! the response carrying the same id.

use std::ffi::OsStr;
use std::process::Stdio;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::protocol::{
    methods, InitializeResult, McpRequest, McpResponse, ToolCallResult, ToolDefinition,
    PROTOCOL_VERSION,
};
use crate::error::{ResearchError, Result};

/// JSON-RPC client over any async line transport
pub struct McpClient<R, W> {
    reader: R,
    writer: W,
    next_id: i64,
}

impl<R, W> McpClient<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
        }
    }

    async fn send(&mut self, request: &McpRequest) -> Result<()> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send a request and wait for its result
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&McpRequest::new(id, method, params)).await?;

        let expected = Some(Value::from(id));
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(ResearchError::Protocol(
                    "Server closed the connection".to_string(),
                ));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response: McpResponse = serde_json::from_str(trimmed)?;
            if response.id == expected {
                return response.into_result();
            }
            tracing::debug!(id = ?response.id, "Skipping unrelated message");
        }
    }

    /// Send a notification (no response expected)
    pub async fn notify(&mut self, method: &str) -> Result<()> {
        self.send(&McpRequest::notification(method)).await
    }

    /// Perform the initialize handshake
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        let result = self
            .request(
                methods::INITIALIZE,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "research-client",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;
        let info: InitializeResult = serde_json::from_value(result)?;
        self.notify(methods::INITIALIZED).await?;
        Ok(info)
    }

    /// List the server's tools
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>> {
        let result = self.request(methods::LIST_TOOLS, json!({})).await?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| ResearchError::Protocol("tools/list result has no tools".to_string()))?;
        Ok(serde_json::from_value(tools)?)
    }

    /// Invoke a tool
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let result = self
            .request(
                methods::CALL_TOOL,
                json!({"name": name, "arguments": arguments}),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

/// A tool server running as a child process, spoken to over its stdio
pub struct StdioSession {
    child: Child,
    client: McpClient<BufReader<ChildStdout>, ChildStdin>,
}

impl StdioSession {
    /// Spawn `program` and connect to its stdin/stdout.
    ///
    /// The child's stderr is inherited so its logs stay visible.
    pub async fn spawn<I, S>(program: &str, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ResearchError::Protocol(format!("Failed to start server `{}`: {}", program, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ResearchError::Internal("Server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ResearchError::Internal("Server stdout unavailable".to_string()))?;

        tracing::info!(program, pid = child.id(), "Tool server started");

        Ok(Self {
            child,
            client: McpClient::new(BufReader::new(stdout), stdin),
        })
    }

    pub fn client(&mut self) -> &mut McpClient<BufReader<ChildStdout>, ChildStdin> {
        &mut self.client
    }

    /// Close the server's stdin and wait for it to exit
    pub async fn shutdown(self) -> Result<()> {
        let Self { mut child, client } = self;
        // Dropping the client closes the pipe, which ends the server's read loop
        drop(client);
        let status = child.wait().await?;
        tracing::info!(%status, "Tool server exited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(responses: &str) -> McpClient<&[u8], Vec<u8>> {
        McpClient::new(responses.as_bytes(), Vec::new())
    }

    fn sent_requests(client: &McpClient<&[u8], Vec<u8>>) -> Vec<Value> {
        String::from_utf8(client.writer.clone())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_call_tool_parses_text_result() {
        let mut client = client_with(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"4\"}]}}\n",
        );
        let result = client
            .call_tool("perform_complex_calculation", json!({"expression": "2 + 2"}))
            .await
            .unwrap();
        assert_eq!(result.first_text(), Some("4"));
        assert!(!result.is_error());

        let sent = sent_requests(&client);
        assert_eq!(sent[0]["method"], "tools/call");
        assert_eq!(sent[0]["params"]["name"], "perform_complex_calculation");
        assert_eq!(sent[0]["params"]["arguments"]["expression"], "2 + 2");
    }

    #[tokio::test]
    async fn test_request_skips_unrelated_ids() {
        let mut client = client_with(concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":99,\"result\":{}}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"tools\":[{\"name\":\"a\",\"description\":\"b\",\"inputSchema\":{}}]}}\n",
        ));
        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "a");
    }

    #[tokio::test]
    async fn test_error_response_becomes_protocol_error() {
        let mut client = client_with(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32601,\"message\":\"Method not found: x\"}}\n",
        );
        let err = client.request("x", json!({})).await.unwrap_err();
        assert!(matches!(err, ResearchError::Protocol(_)));
        assert!(err.to_string().contains("Method not found"));
    }

    #[tokio::test]
    async fn test_eof_is_an_error() {
        let mut client = client_with("");
        assert!(client.request("ping", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_sends_notification() {
        let mut client = client_with(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"protocolVersion\":\"2024-11-05\",\"capabilities\":{\"tools\":{\"listChanged\":false}},\"serverInfo\":{\"name\":\"research-node\",\"version\":\"0.1.0\"}}}\n",
        );
        let info = client.initialize().await.unwrap();
        assert_eq!(info.server_info.name, "research-node");

        let sent = sent_requests(&client);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1]["method"], "notifications/initialized");
        assert!(sent[1].get("id").is_none());
    }
}
