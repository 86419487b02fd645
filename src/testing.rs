//! In-process stand-ins for the hosted models, used by unit and router tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::database::{Document, DocumentStore, ScoredDocument, StoreError};
use crate::providers::traits::{CompletionProvider, EmbeddingProvider, QaAnswer, QaProvider, SearchHit, SearchProvider};

/// Returns queued replies in order, then `fallback` forever. Records every prompt.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: Some("A short generated reply.".to_string()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails as if the API were unreachable.
    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (system message, prompt) pairs in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete_with_system(&self, system_message: &str, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push((system_message.to_string(), prompt.to_string()));

        if let Some(reply) = self.replies.lock().pop_front() {
            return Ok(reply);
        }
        self.fallback.clone().ok_or_else(|| anyhow!("connection refused"))
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok("scripted".to_string())
    }

    fn get_system_message(&self) -> String {
        "You are a test assistant.".to_string()
    }
}

const HASH_DIMENSION: usize = 64;

/// Bag-of-words embedding: each lowercase word is hashed into one of 64
/// buckets. Identical texts embed identically and texts sharing words are
/// close, which is all retrieval tests need.
#[derive(Default)]
pub struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes()
        .fold(0xcbf29ce484222325u64, |hash, byte| (hash ^ byte as u64).wrapping_mul(0x100000001b3))
}

pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; HASH_DIMENSION];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let bucket = (fnv1a(&word.to_lowercase()) % HASH_DIMENSION as u64) as usize;
        vector[bucket] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(hash_embedding(text))
    }

    fn model_name(&self) -> &str {
        "hash-bag-of-words"
    }
}

/// Answers with the first sentence of the context.
#[derive(Default)]
pub struct FirstSentenceQa {
    calls: AtomicUsize,
}

impl FirstSentenceQa {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QaProvider for FirstSentenceQa {
    async fn answer(&self, _question: &str, context: &str) -> Result<QaAnswer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sentence = context.split('.').next().unwrap_or(context).trim();
        Ok(QaAnswer {
            answer: sentence.to_string(),
            score: 0.87,
        })
    }
}

/// Returns the same hits for every query.
pub struct StaticSearch(pub Vec<SearchHit>);

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        Ok(self.0.iter().take(max_results).cloned().collect())
    }
}

/// A vector store whose backend never answers.
pub struct UnreachableStore;

#[async_trait]
impl DocumentStore for UnreachableStore {
    async fn upsert(&self, _document: Document) -> Result<(), StoreError> {
        Err(StoreError::Backend("transport error: connection refused".to_string()))
    }

    async fn similarity_search(&self, _query: &[f32], _k: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        Err(StoreError::Backend("transport error: connection refused".to_string()))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Err(StoreError::Backend("transport error: connection refused".to_string()))
    }
}
