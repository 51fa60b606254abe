//! Research Node - MCP tool server for grounded research answers
//!
//! Semantic retrieval over a small knowledge store, a restricted
//! expression evaluator, and an audit log of every interaction, exposed
//! as MCP tools over stdio. A routing client lives in `bin/client.rs`.

pub mod calculator;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod logging;
pub mod mcp;
pub mod prompts;
pub mod router;
pub mod storage;
pub mod synthesis;
pub mod types;

pub use error::{ResearchError, Result};
pub use storage::Storage;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
