//! LLM provider trait for generating answers

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Turn;

/// A retrieved fragment labeled with its source document
#[derive(Debug, Clone, PartialEq)]
pub struct ContextFragment {
    pub filename: String,
    pub content: String,
}

/// Everything the generation service sees for one turn
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Instruction restricting answers to the supplied context
    pub system_instruction: String,
    /// Prior turns, oldest first
    pub history: Vec<Turn>,
    /// Retrieved fragments in rank order
    pub context: Vec<ContextFragment>,
    /// The new user message
    pub user_text: String,
}

/// Trait for LLM-based answer generation
///
/// Implementations surface `Error::GenerationUnavailable` when the service
/// cannot be reached or rejects the request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate an answer for an assembled request
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> bool;

    /// Models the service can serve; empty when unknown
    async fn available_models(&self) -> Vec<String> {
        Vec::new()
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
