//! Interaction log queries
//!
//! Append-only record of tool invocations. The table is (re)ensured on
//! every write so a log opened against a fresh file never fails.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::Result;
use crate::types::{format_timestamp, Interaction, InteractionId};

/// Create the interactions table if it does not exist
pub fn ensure_interactions_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS interactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            tool_used TEXT NOT NULL,
            response TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Parse an interaction from a database row
fn interaction_from_row(row: &Row) -> rusqlite::Result<Interaction> {
    let timestamp: String = row.get("timestamp")?;
    Ok(Interaction {
        id: row.get("id")?,
        query: row.get("query")?,
        tool_used: row.get("tool_used")?,
        response: row.get("response")?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Append one interaction stamped with the current time
pub fn record_interaction(
    conn: &Connection,
    query: &str,
    tool_used: &str,
    response: &str,
) -> Result<InteractionId> {
    record_interaction_at(conn, query, tool_used, response, Utc::now())
}

/// Append one interaction with an explicit timestamp
pub fn record_interaction_at(
    conn: &Connection,
    query: &str,
    tool_used: &str,
    response: &str,
    timestamp: DateTime<Utc>,
) -> Result<InteractionId> {
    ensure_interactions_table(conn)?;

    conn.execute(
        "INSERT INTO interactions (query, tool_used, response, timestamp) VALUES (?, ?, ?, ?)",
        params![query, tool_used, response, format_timestamp(&timestamp)],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Most recent interactions first, at most `limit` rows
pub fn read_recent_interactions(conn: &Connection, limit: usize) -> Result<Vec<Interaction>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare_cached(
        "SELECT id, query, tool_used, response, timestamp
         FROM interactions
         ORDER BY timestamp DESC, id DESC
         LIMIT ?",
    )?;

    let interactions = stmt
        .query_map(params![limit], interaction_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(interactions)
}

/// Total number of logged interactions
pub fn count_interactions(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))?;
    Ok(count)
}
