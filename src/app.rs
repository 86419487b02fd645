use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{AppState, Backends};
use crate::config::{AnswerMode, AppConfig, EmbeddingBackend, GenerationBackend, ProviderConfig, StoreBackend};
use crate::database::{Database, DocumentStore, FlatStore, QdrantStore};
use crate::llm::AnswerBackend;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider, SearchProvider};
use crate::providers::{DeepSeekProvider, HuggingFaceProvider, OpenAIProvider, TavilyProvider};

pub const SYSTEM_MESSAGE: &str = "You are a helpful research assistant.";

async fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Flat => match &config.flat_store_path {
            Some(path) => {
                let store = FlatStore::open(path)
                    .with_context(|| format!("Failed to open document log {}", path.display()))?;
                info!(path = %path.display(), "Using flat document store");
                Arc::new(store)
            }
            None => {
                info!("Using in-memory document store");
                Arc::new(FlatStore::in_memory())
            }
        },
        StoreBackend::Qdrant => {
            let store = QdrantStore::connect(
                &config.qdrant_url,
                config.qdrant_api_key.as_deref(),
                &config.qdrant_collection,
                config.search_timeout,
            )
            .await
            .context("Failed to connect to Qdrant")?;
            info!(collection = %config.qdrant_collection, "Using Qdrant document store");
            Arc::new(store)
        }
    };
    Ok(store)
}

fn generation_provider(config: &AppConfig) -> Result<Arc<dyn CompletionProvider>> {
    let provider: Arc<dyn CompletionProvider> = match config.generation {
        GenerationBackend::OpenAI => Arc::new(OpenAIProvider::new(
            &ProviderConfig::from_env("openai"),
            SYSTEM_MESSAGE.to_string(),
            config.generation_timeout,
        )?),
        GenerationBackend::DeepSeek => Arc::new(DeepSeekProvider::new(
            &ProviderConfig::from_env("deepseek"),
            SYSTEM_MESSAGE.to_string(),
            config.generation_timeout,
        )?),
    };
    Ok(provider)
}

fn search_provider(config: &AppConfig) -> Result<Option<Arc<dyn SearchProvider>>> {
    let tavily = ProviderConfig::from_env("tavily");
    if tavily.api_key.is_none() {
        warn!("TAVILY_API_KEY not set, research runs without web search");
        return Ok(None);
    }
    let provider: Arc<dyn SearchProvider> = Arc::new(TavilyProvider::new(&tavily, config.search_timeout)?);
    Ok(Some(provider))
}

/// Builds every external client from configuration. Nothing here is global;
/// the returned backends are owned by whoever serves requests.
pub async fn build_backends(config: &AppConfig) -> Result<Backends> {
    let db = Database::new(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let store = open_store(config).await?;
    let generation = generation_provider(config)?;

    let huggingface = Arc::new(HuggingFaceProvider::new(
        &ProviderConfig::from_env("huggingface"),
        config.embedding_timeout,
    )?);

    let embedder: Arc<dyn EmbeddingProvider> = match config.embedding {
        EmbeddingBackend::HuggingFace => huggingface.clone(),
        EmbeddingBackend::OpenAI => Arc::new(OpenAIProvider::new(
            &ProviderConfig::from_env("openai"),
            SYSTEM_MESSAGE.to_string(),
            config.embedding_timeout,
        )?),
    };

    let answer = match config.answer_mode {
        AnswerMode::Extractive => AnswerBackend::Extractive(huggingface),
        AnswerMode::Generative => AnswerBackend::Generative(generation.clone()),
    };

    info!(
        generation = ?config.generation,
        embedding = ?config.embedding,
        answer_mode = ?config.answer_mode,
        "Providers configured"
    );

    Ok(Backends {
        generation,
        embedder,
        answer,
        search: search_provider(config)?,
        store,
        db,
    })
}

pub async fn build_state(config: &AppConfig) -> Result<AppState> {
    let backends = build_backends(config).await?;
    Ok(AppState::new(backends, config.embedding_max_chars))
}
