//! Chat-completion client used to run an assembled prompt through a model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::embeddings::api_error_message;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no message content")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one prompt and return the model's raw text.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible `POST {base_url}/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    config: GenerationConfig,
}

impl OpenAiChatClient {
    pub fn new(config: GenerationConfig) -> Result<Self, CompletionError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();
        if api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(body);
            tracing::error!(code = status.as_u16(), message = %message, "Chat completion API error");
            return Err(CompletionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
