use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored piece of text together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A search hit. `score` is the cosine similarity to the query vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub id: String,
    pub text: String,
    pub score: f32,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Embedding dimension mismatch: store holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Empty embedding for document {0}")]
    EmptyEmbedding(String),
    #[error("Store log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store log encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Vector database error: {0}")]
    Backend(String),
}

/// Minimal capability contract for the vector store: upsert by id and
/// nearest-neighbour lookup by cosine similarity.
///
/// Results of `similarity_search` are ordered by descending score; equal
/// scores keep the order in which ids were first stored.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert(&self, document: Document) -> Result<(), StoreError>;

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;

    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }
}

/// Cosine similarity of two equally sized vectors. Zero-norm input scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Orders by descending score with NaN ranked last. Callers rely on a stable
/// sort so ties keep insertion order.
pub(crate) fn by_score_desc(a: f32, b: f32) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
        // scale does not matter
        assert!((cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_nan_sorts_last() {
        let mut scores = vec![0.2, f32::NAN, 0.9, 0.5];
        scores.sort_by(|a, b| by_score_desc(*a, *b));
        assert_eq!(&scores[..3], &[0.9, 0.5, 0.2]);
        assert!(scores[3].is_nan());
    }
}
