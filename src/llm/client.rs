// src/llm/client.rs
use crate::config::ModelConfig;
use crate::llm::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, EmbeddingRequest, EmbeddingResponse,
};
use crate::llm::{Embedder, LanguageModel};
use crate::utils::error::ModelError;
use async_trait::async_trait;
use reqwest::header;
use std::time::Duration;

// Local models on CPU can take minutes for a long prompt.
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Creates a reqwest client configured for the model server.
fn build_model_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
}

/// Turns a non-2xx response into an error carrying the server's message.
async fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!("HTTP error status: {} for URL: {}", status, url);
    Err(ModelError::Http(status, body))
}

/// Chat-completions client. Deterministic sampling (temperature 0).
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: Option<u32>,
}

impl ChatClient {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        Ok(Self {
            client: build_model_client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        tracing::debug!("Sending {} char prompt to {} ({})", prompt.chars().count(), url, self.model);
        let mut builder = self.client.post(&url).header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = check_status(builder.json(&request).send().await?, &url).await?;
        let body: ChatCompletionResponse = response.json().await?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ModelError::EmptyResponse)
    }
}

/// Embeddings client for the `/embeddings` endpoint.
pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl EmbeddingClient {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        Ok(Self {
            client: build_model_client()?,
            base_url: config.embed_base_url.trim_end_matches('/').to_string(),
            model: config.embed_model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest { model: &self.model, input: texts };

        let mut builder = self.client.post(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = check_status(builder.json(&request).send().await?, &url).await?;
        let mut body: EmbeddingResponse = response.json().await?;

        if body.data.len() != texts.len() {
            return Err(ModelError::EmbeddingCount { sent: texts.len(), received: body.data.len() });
        }
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}
