pub mod api;
pub mod app;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod llm;
pub mod progress;
pub mod providers;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use error::CompanionError;
pub use llm::RetrievalService;
