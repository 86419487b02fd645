use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::providers::traits::{SearchHit, SearchProvider};
use crate::providers::utils::http_client;

#[derive(Clone)]
pub struct TavilyProvider {
    api_key: String,
    api_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: config.require_api_key("tavily")?,
            api_url: config.api_url.clone(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": max_results
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Tavily search failed: Status {}, Body: {}", status, error_text));
        }

        let body: TavilyResponse = response.json().await?;
        Ok(body
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_tolerates_missing_fields() {
        let body: TavilyResponse = serde_json::from_value(json!({
            "query": "rust",
            "results": [{"title": "Rust", "url": "https://www.rust-lang.org"}]
        }))
        .unwrap();
        assert_eq!(body.results.len(), 1);
        assert_eq!(body.results[0].content, "");

        let empty: TavilyResponse = serde_json::from_value(json!({"query": "rust"})).unwrap();
        assert!(empty.results.is_empty());
    }
}
