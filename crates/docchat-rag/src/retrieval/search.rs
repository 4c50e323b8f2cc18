//! Retrieval: embed the query, rank, then gate on the similarity threshold

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::types::RetrievalResult;

use super::index::EmbeddingIndex;

/// Threshold-gated top-K retrieval over the embedding index
pub struct Retriever {
    index: Arc<EmbeddingIndex>,
    top_k: usize,
    similarity_threshold: f32,
}

impl Retriever {
    pub fn new(index: Arc<EmbeddingIndex>, config: &RetrievalConfig) -> Self {
        Self {
            index,
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
        }
    }

    /// Relevant fragments for `query`, possibly none
    ///
    /// An empty index short-circuits without calling the embedding service.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        if self.index.is_empty() {
            tracing::debug!("Index is empty; nothing to retrieve");
            return Ok(RetrievalResult::default());
        }

        let ranked = self.index.query(query, self.top_k).await?;
        let ranked_count = ranked.len();
        let relevant: Vec<_> = ranked
            .into_iter()
            .filter(|r| r.similarity >= self.similarity_threshold)
            .collect();

        tracing::debug!(
            "Retrieved {} of {} top fragments at threshold {}",
            relevant.len(),
            ranked_count,
            self.similarity_threshold
        );
        Ok(RetrievalResult::new(relevant))
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }
}
