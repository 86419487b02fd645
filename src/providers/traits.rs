use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat-completion backend. Implementations carry a default system message
/// that `complete` uses; `complete_with_system` overrides it for one call.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete_with_system(&self, system_message: &str, prompt: &str) -> Result<String>;

    async fn complete(&self, prompt: &str) -> Result<String> {
        let system_message = self.get_system_message();
        self.complete_with_system(&system_message, prompt).await
    }

    async fn get_model_info(&self) -> Result<String>;

    fn get_system_message(&self) -> String;
}

/// Maps text to a fixed-length vector. Deterministic for a fixed model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    pub score: f32,
}

/// Extractive question answering: picks a span of `context` answering `question`.
#[async_trait]
pub trait QaProvider: Send + Sync {
    async fn answer(&self, question: &str, context: &str) -> Result<QaAnswer>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Web search used to gather context for a research topic.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}
