pub mod answer;
pub mod chat;
pub mod embeddings;
pub mod mindmap;
pub mod quiz;
pub mod research;
pub mod retrieval;
pub mod summarize;

pub use answer::{Answer, AnswerBackend, AnsweringService};
pub use chat::ReportChat;
pub use embeddings::EmbeddingGenerator;
pub use mindmap::MindmapGenerator;
pub use quiz::{QuizGenerator, QuizItem};
pub use research::{ReportDraft, ResearchAgent};
pub use retrieval::{RetrievalService, RetrievedContext};
pub use summarize::Summarizer;
