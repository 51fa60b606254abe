//! MCP (Model Context Protocol) server and client
//!
//! JSON-RPC over stdio. The server exposes the research tools; the client
//! drives a server running as a child process.

pub mod client;
pub mod handler;
pub mod protocol;
pub mod tools;

pub use client::{McpClient, StdioSession};
pub use handler::ResearchHandler;
pub use protocol::{
    codes, methods, InitializeResult, McpHandler, McpRequest, McpResponse, McpServer,
    ToolCallResult, ToolContent, ToolDefinition, PROTOCOL_VERSION,
};
pub use tools::{get_tool_definitions, TOOL_DEFINITIONS};
