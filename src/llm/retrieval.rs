use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::{Document, DocumentStore, ScoredDocument};
use crate::error::Result;
use crate::llm::embeddings::EmbeddingGenerator;

/// The best-matching stored document for a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedContext {
    pub id: String,
    pub text: String,
    pub score: f32,
}

impl From<ScoredDocument> for RetrievedContext {
    fn from(doc: ScoredDocument) -> Self {
        Self {
            id: doc.id,
            text: doc.text,
            score: doc.score,
        }
    }
}

/// Embeds text on the way in and questions on the way out; one vector per
/// document, no chunking.
#[derive(Clone)]
pub struct RetrievalService {
    store: Arc<dyn DocumentStore>,
    embeddings: EmbeddingGenerator,
}

impl RetrievalService {
    pub fn new(store: Arc<dyn DocumentStore>, embeddings: EmbeddingGenerator) -> Self {
        Self { store, embeddings }
    }

    /// Stores `text` under `id`, replacing any earlier document with that id.
    pub async fn store(&self, text: &str, id: &str) -> Result<()> {
        let embedding = self.embeddings.generate_embedding(text).await?;
        self.store
            .upsert(Document {
                id: id.to_string(),
                text: text.to_string(),
                embedding,
            })
            .await?;

        info!(id, chars = text.chars().count(), "Stored document for retrieval");
        Ok(())
    }

    /// Most similar stored document, or `None` when nothing is stored.
    pub async fn query(&self, question: &str) -> Result<Option<RetrievedContext>> {
        if self.store.is_empty().await? {
            debug!("Retrieval over an empty store");
            return Ok(None);
        }

        Ok(self.search(question, 1).await?.into_iter().next().map(RetrievedContext::from))
    }

    /// Top `k` documents by cosine similarity, best first.
    pub async fn search(&self, question: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embeddings.generate_embedding(question).await?;
        let results = self.store.similarity_search(&query, k).await?;
        debug!(k, hits = results.len(), "Similarity search finished");
        Ok(results)
    }

    pub async fn document_count(&self) -> Result<usize> {
        Ok(self.store.len().await?)
    }
}
