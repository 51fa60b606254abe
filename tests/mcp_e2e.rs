//! End-to-end tests over the MCP wire protocol
//!
//! The first group feeds newline-delimited JSON-RPC through `McpServer::serve`.
//! The second drives the async client against the handler over an in-memory
//! pipe, and the last spawns the real `research-server` binary.
//!
//! Run with: cargo test --test mcp_e2e

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use research_node::embedding::TfIdfEmbedder;
use research_node::mcp::{McpHandler, McpRequest, McpServer, ResearchHandler};
use research_node::prompts::PromptRegistry;
use research_node::storage::Storage;
use research_node::types::{ReloadPolicy, ServerConfig, StorageConfig};

fn prompt_file() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/registry.yaml"))
}

fn handler_in(dir: &TempDir) -> ResearchHandler {
    let storage = Storage::open(StorageConfig {
        db_path: dir.path().join("research.db").to_string_lossy().into_owned(),
    })
    .unwrap();
    let prompts = Arc::new(PromptRegistry::new(prompt_file(), ReloadPolicy::Always));
    ResearchHandler::new(
        storage,
        Arc::new(TfIdfEmbedder::new(384)),
        prompts,
        ServerConfig::default(),
    )
}

fn request(id: i64, method: &str, params: Value) -> String {
    serde_json::to_string(&McpRequest::new(id, method, params)).unwrap()
}

fn tool_call(id: i64, name: &str, arguments: Value) -> String {
    request(id, "tools/call", json!({"name": name, "arguments": arguments}))
}

fn serve(handler: ResearchHandler, lines: &[String]) -> Vec<Value> {
    let server = McpServer::new(handler);
    let input = lines.join("\n") + "\n";
    let mut output = Vec::new();
    server.serve(Cursor::new(input), &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn result_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap()
}

// ============================================================================
// SERVER OVER A BYTE STREAM
// ============================================================================

mod server_stream {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_session() {
        let dir = TempDir::new().unwrap();
        let responses = serve(
            handler_in(&dir),
            &[
                request(1, "initialize", json!({"protocolVersion": "2024-11-05"})),
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.to_string(),
                request(2, "tools/list", json!({})),
                tool_call(3, "perform_complex_calculation", json!({"expression": "2 + 2"})),
                tool_call(
                    4,
                    "query_knowledge_base",
                    json!({"query": "what is quantum entanglement", "domain": "general"}),
                ),
                tool_call(5, "get_interaction_history", json!({"limit": 10})),
            ],
        );

        // The notification gets no reply
        assert_eq!(responses.len(), 5);
        let ids: Vec<i64> = responses.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "research-node");

        let names: Vec<&str> = responses[1]["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "query_knowledge_base",
                "perform_complex_calculation",
                "get_interaction_history"
            ]
        );

        assert_eq!(result_text(&responses[2]), "4");

        let answer = result_text(&responses[3]);
        assert!(answer.contains("Context found: Quantum Entanglement implies"));
        assert!(answer.ends_with("(Verified)"));

        let rows: Vec<Value> = serde_json::from_str(result_text(&responses[4])).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], "what is quantum entanglement");
        assert_eq!(rows[0][2], "query_knowledge_base");
        assert_eq!(rows[1][1], "2 + 2");
        assert_eq!(rows[1][2], "math_tool");
        assert_eq!(rows[1][3], "4");
    }

    #[test]
    fn test_history_survives_restart() {
        let dir = TempDir::new().unwrap();
        serve(
            handler_in(&dir),
            &[tool_call(1, "perform_complex_calculation", json!({"expression": "6 * 7"}))],
        );

        let responses = serve(
            handler_in(&dir),
            &[tool_call(1, "get_interaction_history", json!({}))],
        );
        let rows: Vec<Value> = serde_json::from_str(result_text(&responses[0])).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][3], "42");
    }

    #[test]
    fn test_seeding_happens_once_across_restarts() {
        let dir = TempDir::new().unwrap();
        let query = tool_call(1, "query_knowledge_base", json!({"query": "plants"}));

        serve(handler_in(&dir), &[query.clone()]);
        let handler = handler_in(&dir);
        assert_eq!(handler.knowledge().count().unwrap(), 3);
        serve(handler, &[query]);

        assert_eq!(handler_in(&dir).knowledge().count().unwrap(), 3);
    }

    #[test]
    fn test_protocol_errors() {
        let dir = TempDir::new().unwrap();
        let responses = serve(
            handler_in(&dir),
            &[
                "{not json".to_string(),
                request(2, "resources/list", json!({})),
                request(3, "tools/call", json!({"arguments": {}})),
                request(4, "ping", json!({})),
                r#"{"jsonrpc":"1.0","id":5,"method":"ping"}"#.to_string(),
            ],
        );

        assert_eq!(responses.len(), 5);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[1]["error"]["code"], -32601);
        assert_eq!(responses[2]["error"]["code"], -32602);
        assert_eq!(responses[3]["result"], json!({}));
        assert_eq!(responses[4]["id"], 5);
        assert_eq!(responses[4]["error"]["code"], -32600);
    }

    #[test]
    fn test_prompt_edits_apply_without_restart() {
        let dir = TempDir::new().unwrap();
        let prompt_path = dir.path().join("registry.yaml");
        std::fs::write(&prompt_path, "research_system_prompt: \"v1 {domain}\"\n").unwrap();

        let registry = PromptRegistry::new(&prompt_path, ReloadPolicy::Always);
        assert_eq!(registry.get("research_system_prompt", &[("domain", "x")]), "v1 x");

        std::fs::write(&prompt_path, "research_system_prompt: \"v2 {domain}\"\n").unwrap();
        assert_eq!(registry.get("research_system_prompt", &[("domain", "x")]), "v2 x");
    }
}

// ============================================================================
// ASYNC CLIENT AGAINST THE HANDLER
// ============================================================================

mod client_pipe {
    use super::*;
    use pretty_assertions::assert_eq;
    use research_node::mcp::McpClient;
    use research_node::router::Router;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    /// Minimal async line loop in front of the synchronous handler
    async fn serve_pipe(handler: Arc<ResearchHandler>, stream: DuplexStream) {
        let (read, mut write) = tokio::io::split(stream);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let request: McpRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(_) => continue,
            };
            let notification = request.is_notification();
            let response = handler.handle_request(request);
            if notification {
                continue;
            }
            let mut out = serde_json::to_string(&response).unwrap();
            out.push('\n');
            if write.write_all(out.as_bytes()).await.is_err() {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_routed_session() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(handler_in(&dir));

        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(serve_pipe(handler.clone(), server_side));

        let (read, write) = tokio::io::split(client_side);
        let mut client = McpClient::new(BufReader::new(read), write);

        let info = client.initialize().await.unwrap();
        assert_eq!(info.server_info.name, "research-node");
        assert_eq!(client.list_tools().await.unwrap().len(), 3);

        let router = Router::default();
        let mut answers = Vec::new();
        for input in ["calculate 3 * 7", "what is quantum entanglement", "show history"] {
            let route = router.route(input);
            let result = client.call_tool(route.tool, route.arguments).await.unwrap();
            answers.push(result.first_text().unwrap().to_string());
        }

        assert_eq!(answers[0], "21");
        assert!(answers[1].contains("Quantum Entanglement"));
        let rows: Vec<Value> = serde_json::from_str(&answers[2]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][2], "query_knowledge_base");
        assert_eq!(rows[1][1], "3 * 7");

        drop(client);
        server.await.unwrap();
    }
}

// ============================================================================
// SPAWNED SERVER BINARY
// ============================================================================

mod spawned_server {
    use super::*;
    use pretty_assertions::assert_eq;
    use research_node::mcp::StdioSession;

    #[tokio::test]
    async fn test_spawned_server_round_trip() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let log_dir = dir.path().join("logs");
        let args = vec![
            "--data-dir".to_string(),
            data_dir.to_string_lossy().into_owned(),
            "--prompt-file".to_string(),
            prompt_file().to_string_lossy().into_owned(),
            "--log-dir".to_string(),
            log_dir.to_string_lossy().into_owned(),
            "--embedding-model".to_string(),
            "tfidf".to_string(),
        ];

        let mut session = StdioSession::spawn(env!("CARGO_BIN_EXE_research-server"), &args)
            .await
            .unwrap();

        session.client().initialize().await.unwrap();
        let result = session
            .client()
            .call_tool("perform_complex_calculation", json!({"expression": "2 ** 8"}))
            .await
            .unwrap();
        assert_eq!(result.first_text(), Some("256"));

        session.shutdown().await.unwrap();

        assert!(data_dir.join("research.db").exists());
        assert!(log_dir.join("app.log").exists());
    }
}
