//! Ollama-based providers for embeddings, generation and vision
//!
//! Wraps the shared `OllamaClient` to implement the provider traits.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};
use crate::generation::{OllamaClient, PromptBuilder};

use super::embedding::EmbeddingProvider;
use super::llm::{GenerationRequest, LlmProvider};
use super::vision::VisionProvider;

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
    dimensions: usize,
    parallel_requests: usize,
}

impl OllamaEmbedder {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            dimensions: config.dimensions,
            parallel_requests: config.parallel_requests,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.client.embed(&self.model, text).await?;
        if embedding.len() != self.dimensions {
            return Err(Error::InvalidConfiguration(format!(
                "model '{}' produced {} dimensions, configured for {}",
                self.model,
                embedding.len(),
                self.dimensions
            )));
        }
        Ok(embedding)
    }

    fn parallelism(&self) -> usize {
        self.parallel_requests
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
}

impl OllamaLlm {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.chat_model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let messages = PromptBuilder::to_messages(request);
        self.client
            .chat(&self.model, &messages, self.temperature)
            .await
            .map_err(|e| Error::GenerationUnavailable(e.to_string()))
    }

    async fn health_check(&self) -> bool {
        self.client.health_check().await
    }

    async fn available_models(&self) -> Vec<String> {
        match self.client.list_models().await {
            Ok(models) => models,
            Err(e) => {
                tracing::warn!("Could not list Ollama models: {}", e);
                Vec::new()
            }
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Vision provider using an Ollama multimodal model (llava, ...)
pub struct OllamaVision {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaVision {
    pub fn from_client(client: Arc<OllamaClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.vision_model.clone(),
        }
    }
}

#[async_trait]
impl VisionProvider for OllamaVision {
    async fn describe(&self, image: &[u8]) -> Result<String> {
        self.client
            .describe_image(&self.model, image)
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| Error::VisionUnavailable(e.to_string()))
    }

    fn name(&self) -> &str {
        "ollama-vision"
    }
}

/// Ollama providers sharing a single client
pub struct OllamaProvider {
    pub embedder: OllamaEmbedder,
    pub llm: OllamaLlm,
    pub vision: OllamaVision,
}

impl OllamaProvider {
    pub fn new(llm: &LlmConfig, embeddings: &EmbeddingConfig) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(llm)?);
        Ok(Self {
            embedder: OllamaEmbedder::from_client(Arc::clone(&client), embeddings),
            llm: OllamaLlm::from_client(Arc::clone(&client), llm),
            vision: OllamaVision::from_client(client, llm),
        })
    }
}
