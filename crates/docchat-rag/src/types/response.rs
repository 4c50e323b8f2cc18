//! Retrieval results and API response types

use serde::{Deserialize, Serialize};

use super::document::{Document, ExtractionWarning, Fragment};

/// A fragment with its cosine similarity to the query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub similarity: f32,
}

/// Ranked fragments for one query, descending by similarity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub fragments: Vec<ScoredFragment>,
}

impl RetrievalResult {
    pub fn new(fragments: Vec<ScoredFragment>) -> Self {
        Self { fragments }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Distinct source filenames in rank order
    pub fn filenames(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for scored in &self.fragments {
            if !names.contains(&scored.fragment.filename) {
                names.push(scored.fragment.filename.clone());
            }
        }
        names
    }
}

/// Chat request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Answer for one conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    /// Filenames of the documents the answer drew on
    pub sources: Vec<String>,
}

/// How an upload was handled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// New document extracted, chunked and indexed
    Ingested,
    /// Fingerprint already registered; nothing was processed
    Duplicate,
    /// Existing document forcibly re-extracted and its fragments replaced
    Reprocessed,
}

/// Result of an ingestion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    pub document: Document,
    /// Pages/sheets/images that could not be extracted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ExtractionWarning>,
}

/// Aggregate database statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentStats {
    pub total_documents: usize,
    pub total_fragments: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
}

impl DocumentStats {
    pub fn new(total_documents: usize, total_fragments: usize, total_size_bytes: u64) -> Self {
        let mb = total_size_bytes as f64 / (1024.0 * 1024.0);
        Self {
            total_documents,
            total_fragments,
            total_size_bytes,
            total_size_mb: (mb * 100.0).round() / 100.0,
        }
    }
}

/// Document listing with statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    pub stats: DocumentStats,
}

/// Outcome of a full reindex
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReindexReport {
    pub documents_reindexed: usize,
    pub fragments_reembedded: usize,
    pub orphans_removed: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub generation_available: bool,
    pub chat_model: String,
    pub embedding_model: String,
    pub documents: usize,
    pub fragments: usize,
}
