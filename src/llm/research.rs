use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::Database;
use crate::error::{CompanionError, Result};
use crate::llm::quiz::{QuizGenerator, QuizItem};
use crate::llm::summarize::Summarizer;
use crate::providers::traits::SearchProvider;

const SEARCH_RESULTS: usize = 5;

/// Outcome of one ingestion: what was generated and where it was saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDraft {
    pub report_id: String,
    pub topic: String,
    pub summary: String,
    pub quiz: Vec<QuizItem>,
}

/// Turns source text into a persisted report. Every ingestion path (uploads
/// and topic research) goes through `build_report`.
#[derive(Clone)]
pub struct ResearchAgent {
    summarizer: Summarizer,
    quiz: QuizGenerator,
    search: Option<Arc<dyn SearchProvider>>,
    db: Database,
}

impl ResearchAgent {
    pub fn new(
        summarizer: Summarizer,
        quiz: QuizGenerator,
        search: Option<Arc<dyn SearchProvider>>,
        db: Database,
    ) -> Self {
        Self {
            summarizer,
            quiz,
            search,
            db,
        }
    }

    /// Web context for `topic`: the contents of the top hits joined by blank
    /// lines, or a fixed "no results" line.
    pub async fn gather_context(&self, topic: &str) -> Result<String> {
        let no_results = format!("No results found for {}.", topic);

        let Some(search) = &self.search else {
            warn!(topic, "No search provider configured, researching without web context");
            return Ok(no_results);
        };

        let hits = search
            .search(topic, SEARCH_RESULTS)
            .await
            .map_err(|e| CompanionError::upstream("web search", e))?;

        let contents: Vec<String> = hits
            .into_iter()
            .map(|hit| hit.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .collect();

        info!(topic, hits = contents.len(), "Web search finished");
        if contents.is_empty() {
            return Ok(no_results);
        }

        Ok(contents.join("\n\n"))
    }

    pub async fn research(&self, topic: &str) -> Result<ReportDraft> {
        let context = self.gather_context(topic).await?;
        self.build_report(topic, &context).await
    }

    /// Summarizes `text`, builds a quiz from it and saves both under `topic`.
    pub async fn build_report(&self, topic: &str, text: &str) -> Result<ReportDraft> {
        self.persist(topic, text, true).await
    }

    /// Like `build_report` but saves the summary with an empty quiz.
    pub async fn build_summary_report(&self, topic: &str, text: &str) -> Result<ReportDraft> {
        self.persist(topic, text, false).await
    }

    async fn persist(&self, topic: &str, text: &str, with_quiz: bool) -> Result<ReportDraft> {
        let summary = self.summarizer.summarize(topic, text).await?;
        let quiz = if with_quiz { self.quiz.generate(text).await? } else { Vec::new() };
        let report_id = self.db.save_report(topic, &summary, &quiz).await?;

        info!(%report_id, topic, questions = quiz.len(), "Saved report");
        Ok(ReportDraft {
            report_id,
            topic: topic.to_string(),
            summary,
            quiz,
        })
    }
}
