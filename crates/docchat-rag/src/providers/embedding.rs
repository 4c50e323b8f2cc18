//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::error::Result;

/// Trait for generating text embeddings
///
/// Every vector produced by one provider has `dimensions()` entries; the
/// embedding index rejects anything else.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, preserving input order
    ///
    /// Default implementation runs `embed` in rounds of `parallelism()` concurrent calls.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.parallelism().max(1)) {
            let pending: Vec<_> = batch.iter().map(|text| self.embed(text)).collect();
            embeddings.extend(try_join_all(pending).await?);
        }
        Ok(embeddings)
    }

    /// Concurrent requests used by `embed_batch`
    fn parallelism(&self) -> usize {
        1
    }

    /// Get embedding dimensions (e.g., 768 for nomic-embed-text)
    fn dimensions(&self) -> usize;

    /// Model identifier recorded alongside stored vectors
    fn model(&self) -> &str;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
