use thiserror::Error;

use crate::database::{DatabaseError, StoreError};

/// Errors surfaced by the companion services to their callers.
#[derive(Error, Debug)]
pub enum CompanionError {
    /// An external AI or search service could not be reached or answered
    /// with something unusable.
    #[error("{service} is unavailable: {source}")]
    Upstream {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl CompanionError {
    pub fn upstream(service: &'static str, source: anyhow::Error) -> Self {
        tracing::error!(service, error = %source, "Upstream call failed");
        Self::Upstream { service, source }
    }
}

impl From<StoreError> for CompanionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Backend(message) => Self::upstream("vector store", anyhow::anyhow!(message)),
            other => Self::Store(other),
        }
    }
}

pub type Result<T, E = CompanionError> = std::result::Result<T, E>;
