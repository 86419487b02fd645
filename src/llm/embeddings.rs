use std::sync::Arc;
use tracing::debug;

use crate::error::{CompanionError, Result};
use crate::providers::traits::EmbeddingProvider;

/// Wraps an embedding backend and bounds the input it is sent. Hosted
/// sentence models silently cut long input at their token limit; we cut at a
/// known character count instead so the loss is visible and deterministic.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    max_chars: usize,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, max_chars: usize) -> Self {
        Self { provider, max_chars }
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let input = truncate_chars(text, self.max_chars);
        if input.len() < text.len() {
            debug!(
                model = self.provider.model_name(),
                original_chars = text.chars().count(),
                kept_chars = self.max_chars,
                "Truncating embedding input"
            );
        }

        let embedding = self
            .provider
            .embed(input)
            .await
            .map_err(|e| CompanionError::upstream("embedding", e))?;

        if embedding.is_empty() {
            return Err(CompanionError::upstream(
                "embedding",
                anyhow::anyhow!("Model {} returned an empty vector", self.provider.model_name()),
            ));
        }

        Ok(embedding)
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
