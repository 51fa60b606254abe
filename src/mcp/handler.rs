//! Request handler behind the research MCP server
//!
//! Each tool call emits a structured `tool_call` event, performs its one
//! action, records the interaction and answers with plain text. Tool
//! failures become text payloads; only malformed requests produce
//! JSON-RPC errors.

use std::sync::Arc;

use serde_json::{json, Value};

use super::protocol::{
    codes, methods, InitializeResult, McpHandler, McpRequest, McpResponse, ToolCallResult,
};
use super::tools::get_tool_definitions;
use crate::calculator::evaluate_to_string;
use crate::embedding::Embedder;
use crate::error::{ResearchError, Result};
use crate::knowledge::KnowledgeStore;
use crate::prompts::PromptRegistry;
use crate::router::{CALCULATION_TOOL, DEFAULT_DOMAIN, HISTORY_TOOL, KNOWLEDGE_TOOL};
use crate::storage::{read_recent_interactions, record_interaction, Storage};
use crate::synthesis::{
    GenerationRequest, Generator, PassThroughVerifier, TemplateGenerator, Verifier,
};
use crate::types::ServerConfig;

/// Label stored in the interaction log for calculations
pub const CALCULATION_LOG_LABEL: &str = "math_tool";

/// MCP request handler for the research tools
pub struct ResearchHandler {
    storage: Storage,
    knowledge: KnowledgeStore,
    prompts: Arc<PromptRegistry>,
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    config: ServerConfig,
}

impl ResearchHandler {
    pub fn new(
        storage: Storage,
        embedder: Arc<dyn Embedder>,
        prompts: Arc<PromptRegistry>,
        config: ServerConfig,
    ) -> Self {
        Self {
            knowledge: KnowledgeStore::new(storage.clone(), embedder),
            storage,
            verifier: Arc::new(PassThroughVerifier::new(prompts.clone())),
            prompts,
            generator: Arc::new(TemplateGenerator),
            config,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Dispatch a tool call by name
    pub fn handle_tool_call(&self, name: &str, params: Value) -> ToolCallResult {
        match name {
            KNOWLEDGE_TOOL => self.tool_query_knowledge_base(params),
            CALCULATION_TOOL => self.tool_perform_calculation(params),
            HISTORY_TOOL => self.tool_get_interaction_history(params),
            _ => ToolCallResult::error(format!("Unknown tool: {}", name)),
        }
    }

    fn tool_query_knowledge_base(&self, params: Value) -> ToolCallResult {
        let query = match params.get("query").and_then(|v| v.as_str()) {
            Some(q) => q,
            None => return ToolCallResult::error("Missing required argument: query"),
        };
        let domain = params
            .get("domain")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_DOMAIN);

        tracing::info!(event = "tool_call", tool = KNOWLEDGE_TOOL, query, domain, "Tool call");

        let response = match self.answer_query(query, domain) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(tool = KNOWLEDGE_TOOL, error = %e, "Knowledge query failed");
                format!("Knowledge Error: {}", e)
            }
        };

        self.log_interaction(query, KNOWLEDGE_TOOL, &response);
        ToolCallResult::text(response)
    }

    fn answer_query(&self, query: &str, domain: &str) -> Result<String> {
        self.knowledge.seed_if_empty()?;

        let documents = self.knowledge.search(query, self.config.top_k)?;
        let context = documents
            .iter()
            .map(|d| d.document.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let system_instruction = self.prompts.get(
            "research_system_prompt",
            &[("domain", domain), ("context", &context)],
        );

        let answer = self.generator.generate(&GenerationRequest {
            system_instruction: &system_instruction,
            query,
            domain,
            documents: &documents,
        })?;

        self.verifier.verify(&answer, &context)
    }

    fn tool_perform_calculation(&self, params: Value) -> ToolCallResult {
        let expression = match params.get("expression").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => return ToolCallResult::error("Missing required argument: expression"),
        };

        tracing::info!(event = "tool_call", tool = CALCULATION_TOOL, expression, "Tool call");

        match evaluate_to_string(expression) {
            Ok(result) => {
                self.log_interaction(expression, CALCULATION_LOG_LABEL, &result);
                ToolCallResult::text(result)
            }
            Err(e) => {
                let message = match e {
                    ResearchError::Calculation(message) => message,
                    other => other.to_string(),
                };
                ToolCallResult::text(format!("Calculation Error: {}", message))
            }
        }
    }

    fn tool_get_interaction_history(&self, params: Value) -> ToolCallResult {
        let requested = params
            .get("limit")
            .and_then(|v| v.as_i64())
            .unwrap_or(self.config.history_default_limit);
        let limit = requested.clamp(0, self.config.history_max_limit.max(0));

        tracing::info!(event = "tool_call", tool = HISTORY_TOOL, requested, limit, "Tool call");

        let result = self.storage.with_connection(|conn| {
            let interactions = read_recent_interactions(conn, limit as usize)?;
            let rows: Vec<Value> = interactions.iter().map(|i| i.as_row()).collect();
            Ok(serde_json::to_string(&rows)?)
        });

        match result {
            Ok(text) => ToolCallResult::text(text),
            Err(e) => {
                tracing::error!(tool = HISTORY_TOOL, error = %e, "History read failed");
                ToolCallResult::text(format!("History Error: {}", e))
            }
        }
    }

    /// Append to the interaction log; failures are logged, not retried
    fn log_interaction(&self, query: &str, tool: &str, response: &str) {
        if let Err(e) = self
            .storage
            .with_connection(|conn| record_interaction(conn, query, tool, response))
        {
            tracing::error!(tool, error = %e, "Failed to record interaction");
        }
    }
}

impl McpHandler for ResearchHandler {
    fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult::default();
                McpResponse::success(request.id, json!(result))
            }
            methods::INITIALIZED => McpResponse::success(request.id, json!({})),
            methods::PING => McpResponse::success(request.id, json!({})),
            methods::LIST_TOOLS => {
                let tools = get_tool_definitions();
                McpResponse::success(request.id, json!({"tools": tools}))
            }
            methods::CALL_TOOL => {
                let name = match request.params.get("name").and_then(|v| v.as_str()) {
                    Some(name) => name.to_string(),
                    None => {
                        return McpResponse::from_error(
                            request.id,
                            ResearchError::InvalidInput("Missing tool name".to_string()),
                        )
                    }
                };
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(json!({}));

                let result = self.handle_tool_call(&name, arguments);
                McpResponse::success(request.id, json!(result))
            }
            _ => McpResponse::error(
                request.id,
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }
}
