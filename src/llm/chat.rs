use std::sync::Arc;
use tracing::info;

use crate::database::Database;
use crate::error::{CompanionError, Result};
use crate::providers::traits::CompletionProvider;

fn grounding_message(summary: &str) -> String {
    format!(
        "You are a helpful research assistant. Answer the user's questions using this summary: \n\n{}\n\n\
         Give short and clear answers. If user asks something not in summary, then clearly say you don't know.",
        summary
    )
}

/// Single-turn chat grounded on a stored report's summary.
#[derive(Clone)]
pub struct ReportChat {
    provider: Arc<dyn CompletionProvider>,
    db: Database,
}

impl ReportChat {
    pub fn new(provider: Arc<dyn CompletionProvider>, db: Database) -> Self {
        Self { provider, db }
    }

    pub async fn chat(&self, report_id: &str, question: &str) -> Result<String> {
        let report = self
            .db
            .get_report(report_id)
            .await?
            .ok_or_else(|| CompanionError::NotFound("Report not found".to_string()))?;

        let answer = self
            .provider
            .complete_with_system(&grounding_message(&report.summary), question)
            .await
            .map_err(|e| CompanionError::upstream("generation", e))?;

        info!(report_id, topic = %report.topic, "Answered report question");
        Ok(answer.trim().to_string())
    }
}
