use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{CompanionError, Result};
use crate::providers::traits::CompletionProvider;

pub const NO_CONTENT_TO_SUMMARIZE: &str = "No content to summarize.";

#[derive(Clone)]
pub struct Summarizer {
    provider: Arc<dyn CompletionProvider>,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub async fn summarize(&self, topic: &str, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            debug!(topic, "Nothing to summarize");
            return Ok(NO_CONTENT_TO_SUMMARIZE.to_string());
        }

        let prompt = format!(
            "Summarize the following information about {} in around 10 lines:\n\n{}",
            topic, text
        );

        let summary = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|e| CompanionError::upstream("generation", e))?;

        info!(topic, summary_chars = summary.len(), "Generated summary");
        Ok(summary.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCompletion;

    #[tokio::test]
    async fn test_empty_text_returns_sentinel_without_model_call() {
        let model = Arc::new(ScriptedCompletion::new(Vec::<String>::new()));
        let summarizer = Summarizer::new(model.clone());

        assert_eq!(summarizer.summarize("anything", "").await.unwrap(), NO_CONTENT_TO_SUMMARIZE);
        assert_eq!(summarizer.summarize("anything", " \n ").await.unwrap(), NO_CONTENT_TO_SUMMARIZE);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompt_names_topic_and_text() {
        let model = Arc::new(ScriptedCompletion::new(["X covers Y and Z.\n"]));
        let summarizer = Summarizer::new(model.clone());

        let summary = summarizer.summarize("Topic X", "Topic X is about Y and Z.").await.unwrap();
        assert_eq!(summary, "X covers Y and Z.");

        let (_, prompt) = &model.prompts()[0];
        assert!(prompt.starts_with("Summarize the following information about Topic X in around 10 lines"));
        assert!(prompt.ends_with("Topic X is about Y and Z."));
    }
}
