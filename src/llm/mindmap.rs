use std::sync::Arc;
use tracing::debug;

use crate::error::{CompanionError, Result};
use crate::providers::traits::CompletionProvider;

pub const NO_CONTENT_TO_MAP: &str = "No content to map.";

const MINDMAP_SYSTEM_MESSAGE: &str = "You turn study material into concept mind maps. \
Reply with a Markdown outline only: one top-level heading for the central topic, \
then nested bullet points for sub-topics and key ideas.";

#[derive(Clone)]
pub struct MindmapGenerator {
    provider: Arc<dyn CompletionProvider>,
}

impl MindmapGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub async fn generate(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            debug!("No text to map");
            return Ok(NO_CONTENT_TO_MAP.to_string());
        }

        let prompt = format!("Create a mind map of the key concepts in this text:\n\n{}", text);
        let mindmap = self
            .provider
            .complete_with_system(MINDMAP_SYSTEM_MESSAGE, &prompt)
            .await
            .map_err(|e| CompanionError::upstream("generation", e))?;

        // models tend to fence the outline
        Ok(mindmap
            .trim()
            .trim_start_matches("```markdown")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string())
    }
}
