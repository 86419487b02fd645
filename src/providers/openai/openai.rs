use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs,
        EmbeddingInput, Role,
    },
    Client,
};
use async_trait::async_trait;
use std::env;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider};
use crate::providers::utils::http_client;

#[derive(Clone)]
pub struct OpenAIProvider {
    system_message: String,
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(config: &ProviderConfig, system_message: String, timeout: Duration) -> Result<Self> {
        let api_key = config.require_api_key("openai")?;
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(config.api_url.clone());
        let client = Client::with_config(openai_config).with_http_client(http_client(timeout)?);

        let chat_model = config.primary_model().unwrap_or("gpt-4o-mini").to_string();
        let embedding_model =
            env::var("OPENAI_EMBEDDING_MODEL").unwrap_or_else(|_| "text-embedding-3-small".to_string());

        Ok(Self {
            system_message,
            client,
            chat_model,
            embedding_model,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete_with_system(&self, system_message: &str, prompt: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .temperature(self.temperature)
            .messages(vec![
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    role: Role::System,
                    content: system_message.to_string(),
                    name: None,
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    role: Role::User,
                    content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
                    name: None,
                }),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("No response content"))
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok(self.chat_model.clone())
    }

    fn get_system_message(&self) -> String {
        self.system_message.clone()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        match response.data.into_iter().next() {
            Some(embedding) if !embedding.embedding.is_empty() => Ok(embedding.embedding),
            _ => Err(anyhow!("No embedding returned from OpenAI")),
        }
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}
