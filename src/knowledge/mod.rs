//! Knowledge store: embedded documents with nearest-neighbour search
//!
//! Documents and their vectors live in SQLite; search is a linear cosine
//! scan, which is plenty for the handful of documents the store holds.

use std::sync::Arc;

use crate::embedding::{cosine_distance, Embedder};
use crate::error::Result;
use crate::storage::documents::{
    count_documents, insert_document, list_embedded_documents, EmbeddedDocument,
};
use crate::storage::Storage;
use crate::types::{DocumentId, NewDocument, ScoredDocument};

/// Documents inserted into an empty store on first use
pub const SEED_DOCUMENTS: &[(&str, &str)] = &[
    (
        "Quantum Entanglement implies that particles remain connected regardless of distance.",
        "Physics_Journal_A",
    ),
    (
        "FastMCP allows for synchronous and asynchronous tool execution in Python.",
        "Tech_Docs",
    ),
    (
        "Photosynthesis efficiency in C4 plants is higher than C3 plants at high temperatures.",
        "Bio_Science_Rev",
    ),
];

/// Similarity search over stored documents
#[derive(Clone)]
pub struct KnowledgeStore {
    storage: Storage,
    embedder: Arc<dyn Embedder>,
}

impl KnowledgeStore {
    pub fn new(storage: Storage, embedder: Arc<dyn Embedder>) -> Self {
        Self { storage, embedder }
    }

    /// Insert the seed documents if the store has none.
    ///
    /// Returns how many documents were inserted.
    pub fn seed_if_empty(&self) -> Result<usize> {
        if self.count()? > 0 {
            return Ok(0);
        }

        let seeds: Vec<NewDocument> = SEED_DOCUMENTS
            .iter()
            .map(|(content, source)| NewDocument::new(*content, *source))
            .collect();

        let contents: Vec<&str> = seeds.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&contents)?;
        let model = self.embedder.model_name().to_string();

        // Another handle may have seeded since the check above
        let inserted = self.storage.with_transaction(|conn| {
            if count_documents(conn)? > 0 {
                return Ok(0);
            }
            for (doc, embedding) in seeds.iter().zip(embeddings.iter()) {
                insert_document(conn, doc, embedding, &model)?;
            }
            Ok(seeds.len())
        })?;

        if inserted > 0 {
            tracing::info!(count = inserted, "Seeded knowledge store");
        }
        Ok(inserted)
    }

    /// Embed and insert documents
    pub fn add_documents(&self, docs: &[NewDocument]) -> Result<Vec<DocumentId>> {
        let contents: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&contents)?;
        let model = self.embedder.model_name().to_string();

        self.storage.with_transaction(|conn| {
            docs.iter()
                .zip(embeddings.iter())
                .map(|(doc, embedding)| insert_document(conn, doc, embedding, &model))
                .collect()
        })
    }

    /// Number of stored documents
    pub fn count(&self) -> Result<i64> {
        self.storage.with_connection(count_documents)
    }

    /// The `k` documents closest to `query`, closest first.
    ///
    /// Only documents embedded by the current model with the query's
    /// dimensionality are compared; the rest are skipped with a warning.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(vec![]);
        }

        let query_embedding = self.embedder.embed(query)?;
        let model = self.embedder.model_name();
        let candidates = self.storage.with_connection(list_embedded_documents)?;

        let total = candidates.len();
        let comparable: Vec<EmbeddedDocument> = candidates
            .into_iter()
            .filter(|c| c.model == model && c.embedding.len() == query_embedding.len())
            .collect();

        let skipped = total - comparable.len();
        if skipped > 0 {
            tracing::warn!(
                skipped,
                model,
                dimensions = query_embedding.len(),
                "Skipping documents embedded with a different model or dimensionality"
            );
        }

        let mut scored: Vec<ScoredDocument> = comparable
            .into_iter()
            .map(|c| ScoredDocument {
                distance: cosine_distance(&query_embedding, &c.embedding),
                document: c.document,
            })
            .collect();

        // Stable sort keeps id order among equal distances
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::TfIdfEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_store() -> KnowledgeStore {
        let storage = Storage::open_in_memory().unwrap();
        KnowledgeStore::new(storage, Arc::new(TfIdfEmbedder::new(384)))
    }

    /// Wraps the TF-IDF embedder, counting calls and optionally renaming it
    struct CountingEmbedder {
        inner: TfIdfEmbedder,
        name: &'static str,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new(dimensions: usize, name: &'static str) -> Self {
            Self {
                inner: TfIdfEmbedder::new(dimensions),
                name,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn model_name(&self) -> &str {
            self.name
        }
    }

    #[test]
    fn test_seed_is_idempotent() {
        let store = test_store();
        assert_eq!(store.seed_if_empty().unwrap(), 3);
        assert_eq!(store.seed_if_empty().unwrap(), 0);
        assert_eq!(store.count().unwrap(), SEED_DOCUMENTS.len() as i64);
    }

    #[test]
    fn test_seed_skipped_when_not_empty() {
        let store = test_store();
        store
            .add_documents(&[NewDocument::new("custom", "Mine")])
            .unwrap();
        assert_eq!(store.seed_if_empty().unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_seeded_store_is_not_re_embedded() {
        let storage = Storage::open_in_memory().unwrap();
        let embedder = Arc::new(CountingEmbedder::new(384, "tfidf"));
        let store = KnowledgeStore::new(storage.clone(), embedder.clone());

        assert_eq!(store.seed_if_empty().unwrap(), 3);
        assert_eq!(embedder.calls(), SEED_DOCUMENTS.len());

        // Later startups against the same database
        for _ in 0..3 {
            let again = KnowledgeStore::new(storage.clone(), embedder.clone());
            assert_eq!(again.seed_if_empty().unwrap(), 0);
        }
        assert_eq!(embedder.calls(), SEED_DOCUMENTS.len());
    }

    #[test]
    fn test_search_skips_other_models() {
        let storage = Storage::open_in_memory().unwrap();
        KnowledgeStore::new(storage.clone(), Arc::new(TfIdfEmbedder::new(384)))
            .seed_if_empty()
            .unwrap();

        let renamed = KnowledgeStore::new(
            storage.clone(),
            Arc::new(CountingEmbedder::new(384, "text-embedding-3-small")),
        );
        assert!(renamed.search("quantum entanglement", 3).unwrap().is_empty());

        renamed
            .add_documents(&[NewDocument::new("quantum entanglement notes", "Mine")])
            .unwrap();
        let hits = renamed.search("quantum entanglement", 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.metadata.source, "Mine");
    }

    #[test]
    fn test_search_skips_other_dimensions() {
        let storage = Storage::open_in_memory().unwrap();
        KnowledgeStore::new(storage.clone(), Arc::new(TfIdfEmbedder::new(384)))
            .seed_if_empty()
            .unwrap();

        let narrower = KnowledgeStore::new(storage, Arc::new(TfIdfEmbedder::new(128)));
        assert!(narrower.search("quantum entanglement", 3).unwrap().is_empty());
        assert_eq!(narrower.count().unwrap(), 3);
    }

    #[test]
    fn test_search_ranks_entanglement_first() {
        let store = test_store();
        store.seed_if_empty().unwrap();

        let hits = store.search("what is quantum entanglement", 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].document.metadata.source, "Physics_Journal_A");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_search_respects_k() {
        let store = test_store();
        store.seed_if_empty().unwrap();

        assert_eq!(store.search("plants", 1).unwrap().len(), 1);
        assert!(store.search("plants", 0).unwrap().is_empty());
        assert_eq!(store.search("plants", 10).unwrap().len(), 3);
    }

    #[test]
    fn test_search_empty_store() {
        let store = test_store();
        assert!(store.search("anything", 3).unwrap().is_empty());
    }
}
