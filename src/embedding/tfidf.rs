//! TF-IDF based embedding
//!
//! Feature-hashed term weights, no external dependencies. Vectors are
//! persisted next to the documents, so the hash must be stable across
//! builds and platforms: FNV-1a is used instead of std's `DefaultHasher`.

use std::collections::HashMap;

use crate::embedding::Embedder;
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Words too common to carry meaning in a short query
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "where",
    "which", "who", "why", "with",
];

/// TF-IDF based embedder using the hashing trick
pub struct TfIdfEmbedder {
    dimensions: usize,
}

impl TfIdfEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Lowercase alphanumeric words, minus stopwords and single characters
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1 && !STOPWORDS.contains(s))
            .map(String::from)
            .collect()
    }

    fn fnv1a(token: &str) -> u64 {
        token.bytes().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        })
    }

    /// Bucket index and sign for a feature
    fn bucket(&self, feature: &str) -> (usize, f32) {
        let hash = Self::fnv1a(feature);
        let idx = (hash % self.dimensions as u64) as usize;
        // Top bit picks the sign, which keeps collisions from always adding up
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }
}

impl Embedder for TfIdfEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = Self::tokenize(text);
        let mut embedding = vec![0.0_f32; self.dimensions];

        if tokens.is_empty() {
            return Ok(embedding);
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let doc_len = tokens.len() as f32;
        for (token, count) in tf {
            let tf_score = (1.0 + count / doc_len).ln();
            // IDF approximation: longer tokens are rarer
            let idf_score = 1.0 + (token.len() as f32 * 0.1);

            let (idx, sign) = self.bucket(token);
            embedding[idx] += tf_score * idf_score * sign;
        }

        for window in tokens.windows(2) {
            let bigram = format!("{}_{}", window[0], window[1]);
            let (idx, sign) = self.bucket(&bigram);
            embedding[idx] += 0.25 * sign;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "tfidf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_tfidf_deterministic() {
        let embedder = TfIdfEmbedder::new(384);
        let e1 = embedder.embed("hello world").unwrap();
        let e2 = embedder.embed("hello world").unwrap();
        assert_eq!(e1, e2);
    }

    #[test]
    fn test_fnv_is_stable() {
        // Reference FNV-1a 64 values
        assert_eq!(TfIdfEmbedder::fnv1a(""), 0xcbf29ce484222325);
        assert_eq!(TfIdfEmbedder::fnv1a("a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_tfidf_similarity() {
        let embedder = TfIdfEmbedder::new(384);

        let e1 = embedder
            .embed("the quick brown fox jumps over the lazy dog")
            .unwrap();
        let e2 = embedder
            .embed("a quick brown fox leaps over a sleepy dog")
            .unwrap();
        let e3 = embedder
            .embed("quantum physics and thermodynamics")
            .unwrap();

        assert!(cosine_similarity(&e1, &e2) > cosine_similarity(&e1, &e3));
    }

    #[test]
    fn test_stopwords_only_is_empty() {
        let embedder = TfIdfEmbedder::new(64);
        let e = embedder.embed("what is the").unwrap();
        assert!(e.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_tfidf_normalized() {
        let embedder = TfIdfEmbedder::new(384);
        let e = embedder
            .embed("this is a test sentence with multiple words")
            .unwrap();

        let norm: f32 = e.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_zero_dimensions_clamped() {
        let embedder = TfIdfEmbedder::new(0);
        assert_eq!(embedder.embed("anything").unwrap().len(), 1);
    }
}
