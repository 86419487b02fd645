use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{CompanionError, Result};
use crate::providers::traits::{CompletionProvider, QaProvider};

pub const NO_RELEVANT_DOCUMENT: &str = "No relevant document found.";

const GROUNDED_SYSTEM_MESSAGE: &str = "You answer questions using only the provided context. \
Give short and clear answers. If the context does not contain the answer, say that you don't know.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Model score, only present for extractive answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Clone)]
pub enum AnswerBackend {
    Extractive(Arc<dyn QaProvider>),
    Generative(Arc<dyn CompletionProvider>),
}

#[derive(Clone)]
pub struct AnsweringService {
    backend: AnswerBackend,
}

impl AnsweringService {
    pub fn new(backend: AnswerBackend) -> Self {
        Self { backend }
    }

    pub fn is_extractive(&self) -> bool {
        matches!(self.backend, AnswerBackend::Extractive(_))
    }

    pub async fn answer(&self, context: &str, question: &str) -> Result<Answer> {
        if context.trim().is_empty() {
            debug!("Empty context, skipping model call");
            return Ok(Answer {
                text: NO_RELEVANT_DOCUMENT.to_string(),
                confidence: None,
            });
        }

        let answer = match &self.backend {
            AnswerBackend::Extractive(qa) => {
                let result = qa
                    .answer(question, context)
                    .await
                    .map_err(|e| CompanionError::upstream("question answering", e))?;
                Answer {
                    text: result.answer,
                    confidence: Some(result.score),
                }
            }
            AnswerBackend::Generative(model) => {
                let prompt = format!("Context:\n{}\n\nQuestion: {}", context, question);
                let text = model
                    .complete_with_system(GROUNDED_SYSTEM_MESSAGE, &prompt)
                    .await
                    .map_err(|e| CompanionError::upstream("generation", e))?;
                Answer {
                    text: text.trim().to_string(),
                    confidence: None,
                }
            }
        };

        info!(confidence = ?answer.confidence, "Answered question");
        Ok(answer)
    }
}
