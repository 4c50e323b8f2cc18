//! Ollama HTTP client with retry logic

use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

const VISION_PROMPT: &str = "Describe this image in detail. Transcribe any visible text, \
numbers, tables or labels exactly, then describe charts, diagrams and other visual content.";

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL without trailing slash
    base_url: String,
    /// Maximum retries
    max_retries: u32,
}

/// One chat message in Ollama's wire format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            images: None,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, what: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "{} request failed (attempt {}/{}): {}; retrying in {:?}",
                            what,
                            attempt + 1,
                            self.max_retries + 1,
                            e,
                            delay
                        );
                        sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal(format!("{what} request never ran"))))
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Names of locally available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Generate an embedding, surfacing `EmbeddingUnavailable` once retries are exhausted
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let (client, url) = (&self.client, url.as_str());

        self.retry_request("Embedding", move || async move {
            let response = client
                .post(url)
                .json(&EmbedRequest { model, prompt: text })
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::internal(format!("HTTP {status} - {body}")));
            }

            let embed_response: EmbedResponse = response.json().await?;
            if embed_response.embedding.is_empty() {
                return Err(Error::internal(format!(
                    "model '{model}' returned an empty embedding"
                )));
            }
            Ok(embed_response.embedding)
        })
        .await
        .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))
    }

    /// Non-streaming chat completion
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        tracing::info!("Generating answer with model: {}", model);

        let (client, url) = (&self.client, url.as_str());

        self.retry_request("Generation", move || async move {
            let request = ChatRequest {
                model,
                messages,
                stream: false,
                options: ChatOptions { temperature },
            };

            let response = client.post(url).json(&request).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::internal(format!("HTTP {status} - {body}")));
            }

            let chat_response: ChatResponse = response.json().await?;
            Ok(chat_response.message.content)
        })
        .await
    }

    /// Describe an image with a vision-capable model
    pub async fn describe_image(&self, model: &str, image: &[u8]) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let messages = [ChatMessage {
            role: "user".to_string(),
            content: VISION_PROMPT.to_string(),
            images: Some(vec![encoded]),
        }];

        self.chat(model, &messages, 0.0).await
    }
}
