use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub models: Vec<String>,
    pub api_url: String,
    pub temperature: f32,
}

impl ProviderConfig {
    pub fn from_env(provider: &str) -> Self {
        let prefix = provider.to_uppercase();

        let api_key = env::var(format!("{}_API_KEY", prefix)).ok().filter(|k| !k.is_empty());

        let defaults = Self::defaults(provider);

        // Get models from env or use defaults
        let models = env::var(format!("{}_MODELS", prefix))
            .map(|m| m.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or(defaults.models);

        let api_url = env::var(format!("{}_API_URL", prefix)).unwrap_or(defaults.api_url);

        let temperature = env::var(format!("{}_TEMPERATURE", prefix))
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.temperature);

        Self {
            api_key,
            models,
            api_url,
            temperature,
        }
    }

    /// Built-in settings for `provider`, before any environment overrides.
    pub fn defaults(provider: &str) -> Self {
        let models = match provider {
            "openai" => vec!["gpt-4o-mini".to_string(), "gpt-3.5-turbo".to_string()],
            "deepseek" => vec!["deepseek-chat".to_string()],
            "huggingface" => vec![
                "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                "deepset/bert-base-cased-squad2".to_string(),
            ],
            _ => vec![],
        };

        let api_url = match provider {
            "openai" => "https://api.openai.com/v1",
            "deepseek" => "https://api.deepseek.com/v1/chat/completions",
            "huggingface" => "https://api-inference.huggingface.co",
            "tavily" => "https://api.tavily.com/search",
            _ => "",
        };

        Self {
            api_key: None,
            models,
            api_url: api_url.to_string(),
            temperature: 0.7,
        }
    }

    pub fn primary_model(&self) -> Option<&str> {
        self.models.first().map(String::as_str)
    }

    pub fn require_api_key(&self, provider: &str) -> Result<String> {
        self.api_key
            .clone()
            .ok_or_else(|| anyhow!("{}_API_KEY must be set", provider.to_uppercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationBackend {
    OpenAI,
    DeepSeek,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    HuggingFace,
    OpenAI,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    Extractive,
    Generative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Flat,
    Qdrant,
}

impl FromStr for GenerationBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "deepseek" => Ok(Self::DeepSeek),
            other => Err(anyhow!("Unknown generation provider: {}", other)),
        }
    }
}

impl FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "openai" => Ok(Self::OpenAI),
            other => Err(anyhow!("Unknown embedding provider: {}", other)),
        }
    }
}

impl FromStr for AnswerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "extractive" => Ok(Self::Extractive),
            "generative" => Ok(Self::Generative),
            other => Err(anyhow!("Unknown answer mode: {}", other)),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "flat" | "memory" => Ok(Self::Flat),
            "qdrant" => Ok(Self::Qdrant),
            other => Err(anyhow!("Unknown vector store: {}", other)),
        }
    }
}

/// Process-wide settings, read once by the entry point.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub store_backend: StoreBackend,
    /// JSON Lines log for the flat store. `None` keeps documents in memory only.
    pub flat_store_path: Option<PathBuf>,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
    pub generation: GenerationBackend,
    pub embedding: EmbeddingBackend,
    pub answer_mode: AnswerMode,
    pub embedding_max_chars: usize,
    pub generation_timeout: Duration,
    pub embedding_timeout: Duration,
    pub search_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_path: PathBuf::from("data/companion.db"),
            store_backend: StoreBackend::Flat,
            flat_store_path: Some(PathBuf::from("data/documents.jsonl")),
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: None,
            qdrant_collection: "research_docs".to_string(),
            generation: GenerationBackend::OpenAI,
            embedding: EmbeddingBackend::HuggingFace,
            answer_mode: AnswerMode::Extractive,
            embedding_max_chars: 2000,
            generation_timeout: Duration::from_secs(60),
            embedding_timeout: Duration::from_secs(15),
            search_timeout: Duration::from_secs(20),
        }
    }
}

fn parsed<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("Invalid value for {}: {}", key, e)),
        _ => Ok(None),
    }
}

fn seconds(key: &str, default: Duration) -> Result<Duration> {
    Ok(parsed::<u64>(key)?.map(Duration::from_secs).unwrap_or(default))
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let flat_store_path = match env::var("FLAT_STORE_PATH") {
            Ok(path) if path.trim().is_empty() || path == ":memory:" => None,
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => defaults.flat_store_path,
        };

        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or(defaults.host),
            port: parsed("PORT")?.unwrap_or(defaults.port),
            database_path: env::var("DATABASE_PATH").map(PathBuf::from).unwrap_or(defaults.database_path),
            store_backend: parsed("VECTOR_STORE")?.unwrap_or(defaults.store_backend),
            flat_store_path,
            qdrant_url: env::var("QDRANT_URL").unwrap_or(defaults.qdrant_url),
            qdrant_api_key: env::var("QDRANT_API_KEY").ok().filter(|k| !k.is_empty()),
            qdrant_collection: env::var("QDRANT_COLLECTION").unwrap_or(defaults.qdrant_collection),
            generation: parsed("GENERATION_PROVIDER")?.unwrap_or(defaults.generation),
            embedding: parsed("EMBEDDING_PROVIDER")?.unwrap_or(defaults.embedding),
            answer_mode: parsed("ANSWER_MODE")?.unwrap_or(defaults.answer_mode),
            embedding_max_chars: parsed("EMBEDDING_MAX_CHARS")?.unwrap_or(defaults.embedding_max_chars),
            generation_timeout: seconds("GENERATION_TIMEOUT_SECS", defaults.generation_timeout)?,
            embedding_timeout: seconds("EMBEDDING_TIMEOUT_SECS", defaults.embedding_timeout)?,
            search_timeout: seconds("SEARCH_TIMEOUT_SECS", defaults.search_timeout)?,
        })
    }
}
