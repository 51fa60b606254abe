//! Core types for the research node

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Interaction ID type
pub type InteractionId = i64;

/// Document ID type
pub type DocumentId = i64;

/// One logged tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub query: String,
    pub tool_used: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    /// Positional row form used by the history tool:
    /// `[id, query, tool_used, response, timestamp]`
    pub fn as_row(&self) -> Value {
        json!([
            self.id,
            self.query,
            self.tool_used,
            self.response,
            format_timestamp(&self.timestamp),
        ])
    }
}

/// Timestamp text format shared by storage and rendering.
///
/// Fixed-width UTC with microseconds, so lexical order is chronological.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Document metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
}

/// A stored knowledge document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Input for inserting a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl NewDocument {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
            },
        }
    }
}

/// Search hit: a document and its cosine distance to the query (lower is closer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub distance: f32,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "data/research.db".to_string(),
        }
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model to use: "openai", "tfidf"
    pub model: String,
    /// OpenAI API key (for openai model)
    pub api_key: Option<String>,
    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,
    /// Embedding model name override (e.g., "text-embedding-3-small")
    pub embedding_model: Option<String>,
    /// Embedding dimensions (must match model output)
    /// Default: 384 for TF-IDF, 1536 for text-embedding-3-small
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "tfidf".to_string(),
            api_key: None,
            base_url: None,
            embedding_model: None,
            dimensions: 384,
        }
    }
}

/// When the prompt registry re-reads its backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPolicy {
    /// Re-read on every lookup so external edits show up immediately
    #[default]
    Always,
    /// Read once, then only on an explicit `reload()`
    Cached,
}

impl std::str::FromStr for ReloadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(ReloadPolicy::Always),
            "cached" => Ok(ReloadPolicy::Cached),
            _ => Err(format!("Unknown reload policy: {}", s)),
        }
    }
}

/// Prompt registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Path to the YAML prompt definitions
    pub path: String,
    #[serde(default)]
    pub reload: ReloadPolicy,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            path: "prompts/registry.yaml".to_string(),
            reload: ReloadPolicy::Always,
        }
    }
}

/// Tool server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Documents retrieved per knowledge query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Default row count for the history tool
    #[serde(default = "default_history_limit")]
    pub history_default_limit: i64,
    /// Upper bound applied to the history tool's `limit`
    #[serde(default = "default_history_max_limit")]
    pub history_max_limit: i64,
}

fn default_top_k() -> usize {
    3
}

fn default_history_limit() -> i64 {
    5
}

fn default_history_max_limit() -> i64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            history_default_limit: default_history_limit(),
            history_max_limit: default_history_max_limit(),
        }
    }
}
