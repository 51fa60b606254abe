//! Knowledge document queries

use rusqlite::{params, Connection, Row};

use crate::error::{ResearchError, Result};
use crate::types::{Document, DocumentId, DocumentMetadata, NewDocument};

fn document_from_row(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get("id")?,
        content: row.get("content")?,
        metadata: DocumentMetadata {
            source: row.get("source")?,
        },
    })
}

/// Insert a document together with its embedding
pub fn insert_document(
    conn: &Connection,
    doc: &NewDocument,
    embedding: &[f32],
    model: &str,
) -> Result<DocumentId> {
    conn.execute(
        "INSERT INTO documents (content, source) VALUES (?, ?)",
        params![doc.content, doc.metadata.source],
    )?;
    let id = conn.last_insert_rowid();

    let embedding_bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
    conn.execute(
        "INSERT OR REPLACE INTO document_embeddings (document_id, embedding, model, dimensions)
         VALUES (?, ?, ?, ?)",
        params![id, embedding_bytes, model, embedding.len() as i64],
    )?;

    Ok(id)
}

/// Number of stored documents
pub fn count_documents(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
    Ok(count)
}

/// A stored document with the vector and model it was embedded with
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    pub document: Document,
    pub embedding: Vec<f32>,
    pub model: String,
}

/// All documents that have an embedding, ordered by id
pub fn list_embedded_documents(conn: &Connection) -> Result<Vec<EmbeddedDocument>> {
    let mut stmt = conn.prepare_cached(
        "SELECT d.id, d.content, d.source, e.embedding, e.model, e.dimensions
         FROM documents d
         JOIN document_embeddings e ON e.document_id = d.id
         ORDER BY d.id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            let doc = document_from_row(row)?;
            let bytes: Vec<u8> = row.get("embedding")?;
            let model: String = row.get("model")?;
            let dimensions: i64 = row.get("dimensions")?;
            Ok((doc, bytes, model, dimensions))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(document, bytes, model, dimensions)| {
            Ok(EmbeddedDocument {
                document,
                embedding: decode_embedding(&bytes, dimensions)?,
                model,
            })
        })
        .collect()
}

fn decode_embedding(bytes: &[u8], dimensions: i64) -> Result<Vec<f32>> {
    let dimensions = usize::try_from(dimensions)
        .map_err(|_| ResearchError::Storage(format!("Invalid dimensions {}", dimensions)))?;
    let expected_len = dimensions
        .checked_mul(4)
        .ok_or_else(|| ResearchError::Storage("Embedding dimensions too large".to_string()))?;
    if bytes.len() != expected_len {
        return Err(ResearchError::Storage(format!(
            "Embedding byte length {} does not match dimensions {}",
            bytes.len(),
            dimensions
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
