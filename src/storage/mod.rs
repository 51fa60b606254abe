//! Storage engine for the research node
//!
//! Handles SQLite connection setup, schema management, the interaction
//! log and the knowledge document tables.

mod connection;
pub mod documents;
pub mod interactions;
mod migrations;

pub use connection::Storage;
pub use interactions::{
    count_interactions, read_recent_interactions, record_interaction, record_interaction_at,
};
pub use migrations::SCHEMA_VERSION;
