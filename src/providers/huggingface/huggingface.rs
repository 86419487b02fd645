use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::providers::traits::{EmbeddingProvider, QaAnswer, QaProvider};
use crate::providers::utils::http_client;

const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_QA_MODEL: &str = "deepset/bert-base-cased-squad2";

/// Hugging Face Inference API client serving the sentence-embedding model
/// and the extractive question-answering model.
#[derive(Clone)]
pub struct HuggingFaceProvider {
    api_key: Option<String>,
    api_url: String,
    client: Client,
    embedding_model: String,
    qa_model: String,
}

impl HuggingFaceProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let mut models = config.models.iter();
        Ok(Self {
            api_key: config.api_key.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
            embedding_model: models.next().cloned().unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            qa_model: models.next().cloned().unwrap_or_else(|| DEFAULT_QA_MODEL.to_string()),
        })
    }

    async fn post(&self, url: String, body: Value) -> Result<Value> {
        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Hugging Face request failed: Status {}, Body: {}", status, error_text));
        }

        Ok(response.json().await?)
    }
}

/// Sentence-transformer pipelines return one pooled vector; token-level
/// models return one vector per token, which we mean-pool.
fn parse_embedding(value: &Value) -> Result<Vec<f32>> {
    let rows = value.as_array().ok_or_else(|| anyhow!("Embedding response is not an array: {}", value))?;

    if rows.iter().all(Value::is_number) {
        let vector: Vec<f32> = rows.iter().filter_map(Value::as_f64).map(|x| x as f32).collect();
        if vector.is_empty() {
            return Err(anyhow!("Empty embedding returned"));
        }
        return Ok(vector);
    }

    // [[...]] for a single input, [[[...]]] for token-level output
    let tokens: Vec<Vec<f32>> = match rows.first() {
        Some(Value::Array(inner)) if inner.first().map(Value::is_array).unwrap_or(false) => {
            inner.iter().map(parse_embedding).collect::<Result<_>>()?
        }
        _ => rows.iter().map(parse_embedding).collect::<Result<_>>()?,
    };

    if tokens.len() == 1 {
        return tokens.into_iter().next().ok_or_else(|| anyhow!("Empty embedding returned"));
    }

    let dimension = tokens.first().map(Vec::len).ok_or_else(|| anyhow!("Empty embedding returned"))?;
    if tokens.iter().any(|t| t.len() != dimension) {
        return Err(anyhow!("Ragged token embeddings returned"));
    }

    let mut pooled = vec![0.0f32; dimension];
    for token in &tokens {
        for (acc, x) in pooled.iter_mut().zip(token) {
            *acc += x;
        }
    }
    let count = tokens.len() as f32;
    pooled.iter_mut().for_each(|x| *x /= count);
    Ok(pooled)
}

fn parse_qa(value: &Value) -> Result<QaAnswer> {
    // some deployments wrap the answer in a list
    let value = match value {
        Value::Array(items) => items.first().ok_or_else(|| anyhow!("Empty QA response"))?,
        other => other,
    };

    if let Some(error) = value.get("error") {
        return Err(anyhow!("QA model returned error: {}", error));
    }

    let answer = value
        .get("answer")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("QA response has no answer: {}", value))?;
    let score = value.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32;

    Ok(QaAnswer {
        answer: answer.trim().to_string(),
        score,
    })
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/pipeline/feature-extraction/{}", self.api_url, self.embedding_model);
        let body = json!({
            "inputs": text,
            "options": { "wait_for_model": true }
        });

        let response = self.post(url, body).await?;
        parse_embedding(&response)
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl QaProvider for HuggingFaceProvider {
    async fn answer(&self, question: &str, context: &str) -> Result<QaAnswer> {
        let url = format!("{}/models/{}", self.api_url, self.qa_model);
        let body = json!({
            "inputs": {
                "question": question,
                "context": context
            },
            "options": { "wait_for_model": true }
        });

        let response = self.post(url, body).await?;
        parse_qa(&response)
    }
}
