//! Error types for the research node

use thiserror::Error;

use crate::mcp::codes;

/// JSON-RPC code for failures that are not the caller's fault
const SERVER_ERROR: i64 = -32000;

/// Result type alias for research node operations
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Main error type for the research node
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    #[cfg(feature = "openai")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResearchError {
    /// Get error code for MCP protocol
    pub fn code(&self) -> i64 {
        match self {
            ResearchError::InvalidInput(_) => codes::INVALID_PARAMS,
            ResearchError::Protocol(_) => codes::INVALID_REQUEST,
            ResearchError::Serialization(_) => codes::PARSE_ERROR,
            _ => SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ResearchError::InvalidInput("x".into()).code(), -32602);
        assert_eq!(ResearchError::Storage("x".into()).code(), -32000);
        assert_eq!(ResearchError::Protocol("x".into()).code(), -32600);

        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(ResearchError::from(parse).code(), -32700);
    }

    #[test]
    fn test_error_display() {
        let err = ResearchError::Calculation("division by zero".into());
        assert_eq!(err.to_string(), "Calculation error: division by zero");
    }
}
