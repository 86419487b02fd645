use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::providers::traits::CompletionProvider;
use crate::providers::utils::http_client;

/// Chat client for DeepSeek or any endpoint speaking the OpenAI chat
/// completions wire format.
#[derive(Clone)]
pub struct DeepSeekProvider {
    api_key: String,
    api_url: String,
    system_message: String,
    client: Client,
    model: String,
    temperature: f32,
}

impl DeepSeekProvider {
    pub fn new(config: &ProviderConfig, system_message: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: config.require_api_key("deepseek")?,
            api_url: config.api_url.clone(),
            system_message,
            client: http_client(timeout)?,
            model: config.primary_model().unwrap_or("deepseek-chat").to_string(),
            temperature: config.temperature,
        })
    }
}

/// Pulls `choices[0].message.content` out of a chat completion response.
fn completion_text(response_json: &Value) -> Result<String> {
    // Check for API-level errors
    if let Some(error) = response_json.get("error") {
        return Err(anyhow!("API returned error: {}", error));
    }

    response_json
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            let debug_json = serde_json::to_string_pretty(response_json).unwrap_or_default();
            anyhow!("Invalid response format. Response JSON: {}", debug_json)
        })
}

#[async_trait]
impl CompletionProvider for DeepSeekProvider {
    async fn complete_with_system(&self, system_message: &str, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "system",
                        "content": system_message
                    },
                    {
                        "role": "user",
                        "content": prompt
                    }
                ],
                "temperature": self.temperature
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("API request failed: Status {}, Body: {}", status, error_text));
        }

        let response_json: Value = response.json().await?;
        completion_text(&response_json)
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok(self.model.clone())
    }

    fn get_system_message(&self) -> String {
        self.system_message.clone()
    }
}
