use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{CompanionError, Result};
use crate::providers::traits::CompletionProvider;
use crate::providers::utils::extract_json_block;

pub const MAX_OPTIONS: usize = 4;
const QUESTION_COUNT: usize = 5;

/// One quiz question. `answer` is not required to be one of `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizItem {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
}

impl QuizItem {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("empty question".to_string());
        }
        if self.answer.trim().is_empty() {
            return Err(format!("empty answer for \"{}\"", self.question));
        }
        if self.options.len() > MAX_OPTIONS {
            return Err(format!("{} options for \"{}\"", self.options.len(), self.question));
        }
        Ok(())
    }
}

/// Parses a model reply into quiz items. Anything short of a well-formed
/// array of valid items is an error; the caller decides the fallback.
pub fn parse_quiz(response: &str) -> std::result::Result<Vec<QuizItem>, String> {
    let json = extract_json_block(response);
    let items: Vec<QuizItem> = serde_json::from_str(json).map_err(|e| e.to_string())?;
    for item in &items {
        item.validate()?;
    }
    Ok(items)
}

#[derive(Clone)]
pub struct QuizGenerator {
    provider: Arc<dyn CompletionProvider>,
}

impl QuizGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Malformed model output yields an empty quiz, never an error. Only an
    /// unreachable model is reported.
    pub async fn generate(&self, text: &str) -> Result<Vec<QuizItem>> {
        if text.trim().is_empty() {
            debug!("No text to build a quiz from");
            return Ok(Vec::new());
        }

        let prompt = format!(
            "Create a quiz of {count} questions about the text below. Respond with ONLY a JSON array, \
             where each element has the keys \"question\" (string), \"options\" (array of up to \
             {max} strings) and \"answer\" (string).\n\nText:\n{text}",
            count = QUESTION_COUNT,
            max = MAX_OPTIONS,
            text = text
        );

        let response = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|e| CompanionError::upstream("generation", e))?;

        match parse_quiz(&response) {
            Ok(items) => {
                info!(questions = items.len(), "Generated quiz");
                Ok(items)
            }
            Err(reason) => {
                warn!(%reason, response_chars = response.len(), "Discarding malformed quiz output");
                Ok(Vec::new())
            }
        }
    }
}
