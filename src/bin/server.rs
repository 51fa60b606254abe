//! Research Node MCP Server
//!
//! Run with: research-server

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use research_node::embedding::create_embedder;
use research_node::error::Result;
use research_node::logging::init_logging;
use research_node::mcp::{McpServer, ResearchHandler};
use research_node::prompts::PromptRegistry;
use research_node::storage::Storage;
use research_node::types::*;

#[derive(Parser, Debug)]
#[command(name = "research-server")]
#[command(about = "Research Node MCP tool server (JSON-RPC over stdio)")]
struct Args {
    /// Directory holding persistent data
    #[arg(long, env = "RESEARCH_DATA_DIR", default_value = "data")]
    data_dir: String,

    /// Database path (defaults to <data-dir>/research.db)
    #[arg(long, env = "RESEARCH_DB_PATH")]
    db_path: Option<String>,

    /// YAML prompt registry
    #[arg(long, env = "RESEARCH_PROMPT_FILE", default_value = "prompts/registry.yaml")]
    prompt_file: String,

    /// Prompt reload policy (always, cached)
    #[arg(long, env = "RESEARCH_PROMPT_RELOAD", default_value = "always")]
    prompt_reload: ReloadPolicy,

    /// Directory for the JSON log file
    #[arg(long, env = "RESEARCH_LOG_DIR", default_value = "logs")]
    log_dir: String,

    /// Embedding model (openai, tfidf)
    #[arg(long, env = "RESEARCH_EMBEDDING_MODEL", default_value = "tfidf")]
    embedding_model: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_key: Option<String>,

    /// Documents retrieved per knowledge query
    #[arg(long, env = "RESEARCH_TOP_K", default_value = "3")]
    top_k: usize,

    /// Upper bound for the history tool's limit
    #[arg(long, env = "RESEARCH_HISTORY_MAX_LIMIT", default_value = "100")]
    history_max_limit: i64,
}

impl Args {
    fn resolved_db_path(&self) -> String {
        match &self.db_path {
            Some(path) => shellexpand::tilde(path).to_string(),
            None => {
                let data_dir = shellexpand::tilde(&self.data_dir).to_string();
                Path::new(&data_dir)
                    .join("research.db")
                    .to_string_lossy()
                    .into_owned()
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Stdout is reserved for the protocol
    let log_dir = PathBuf::from(shellexpand::tilde(&args.log_dir).to_string());
    let log_path = init_logging(&log_dir, true)?;

    let storage = Storage::open(StorageConfig {
        db_path: args.resolved_db_path(),
    })?;

    let embedder = create_embedder(&EmbeddingConfig {
        model: args.embedding_model.clone(),
        api_key: args.openai_key.clone(),
        ..Default::default()
    })?;

    let prompts = Arc::new(PromptRegistry::from_config(&PromptConfig {
        path: args.prompt_file.clone(),
        reload: args.prompt_reload,
    }));

    let config = ServerConfig {
        top_k: args.top_k,
        history_max_limit: args.history_max_limit,
        ..Default::default()
    };

    tracing::info!(
        db_path = storage.db_path(),
        prompts = %prompts.path().display(),
        prompt_reload = ?prompts.policy(),
        log_file = %log_path.display(),
        embedder = args.embedding_model.as_str(),
        "Research server starting"
    );

    let handler = ResearchHandler::new(storage, embedder, prompts, config);
    let server = McpServer::new(handler);
    server.run()?;

    tracing::info!("Research server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path_defaults_under_data_dir() {
        let args = Args::parse_from(["research-server", "--data-dir", "/tmp/research"]);
        assert_eq!(args.resolved_db_path(), "/tmp/research/research.db");
    }

    #[test]
    fn test_explicit_db_path_wins() {
        let args = Args::parse_from([
            "research-server",
            "--data-dir",
            "/tmp/research",
            "--db-path",
            "/tmp/other.db",
        ]);
        assert_eq!(args.resolved_db_path(), "/tmp/other.db");
    }

    #[test]
    fn test_reload_policy_flag() {
        let args = Args::parse_from(["research-server", "--prompt-reload", "cached"]);
        assert_eq!(args.prompt_reload, ReloadPolicy::Cached);
    }
}
