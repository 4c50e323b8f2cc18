//! Embedding index with exact cosine ranking
//!
//! Fragments live in SQLite and are mirrored in memory in insertion order.
//! Every write for one document is one SQL transaction followed by an
//! in-memory swap under the write lock, so readers see a document either
//! completely before or completely after a change.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::storage::{Database, FragmentRecord, IndexMeta};
use crate::types::{Fragment, ScoredFragment};

/// Cosine similarity; 0.0 for empty or mismatched vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[derive(Default)]
struct IndexState {
    /// Ordered by `seq`
    entries: Vec<FragmentRecord>,
    /// Stored vectors were produced by a different model or dimensionality
    stale: bool,
}

/// Sole writer of fragment vectors
pub struct EmbeddingIndex {
    db: Arc<Database>,
    embedder: Arc<dyn EmbeddingProvider>,
    state: RwLock<IndexState>,
}

impl EmbeddingIndex {
    /// Load all persisted fragments, checking them against the embedder's model
    pub fn open(db: Arc<Database>, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let current = IndexMeta {
            model: embedder.model().to_string(),
            dimensions: embedder.dimensions(),
        };
        let entries = db.load_fragments()?;

        let stale = match db.index_meta()? {
            None => {
                db.set_index_meta(&current)?;
                false
            }
            Some(stored) if stored == current => false,
            Some(stored) => {
                tracing::warn!(
                    "Index was built with {} ({} dims) but {} ({} dims) is configured; reindex required",
                    stored.model,
                    stored.dimensions,
                    current.model,
                    current.dimensions
                );
                true
            }
        };
        let stale = stale || entries.iter().any(|e| e.embedding.len() != current.dimensions);

        tracing::info!("Embedding index loaded {} fragments", entries.len());

        Ok(Self {
            db,
            embedder,
            state: RwLock::new(IndexState { entries, stale }),
        })
    }

    fn ensure_current(&self) -> Result<()> {
        if self.state.read().stale {
            return Err(Error::InvalidConfiguration(
                "embedding model changed since the index was built; run a reindex".to_string(),
            ));
        }
        Ok(())
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        let expected = self.embedder.dimensions();
        if vector.len() != expected {
            return Err(Error::InvalidConfiguration(format!(
                "embedding has {} dimensions, index expects {}",
                vector.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Embed `fragments` and atomically replace the document's fragments with them
    ///
    /// Nothing is written if any embedding fails.
    pub async fn add(&self, document_id: &str, fragments: Vec<Fragment>) -> Result<usize> {
        self.ensure_current()?;

        let texts: Vec<String> = fragments.iter().map(|f| f.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != fragments.len() {
            return Err(Error::internal(format!(
                "embedder returned {} vectors for {} fragments",
                embeddings.len(),
                fragments.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimensions(embedding)?;
        }

        let rows: Vec<(Fragment, Vec<f32>)> = fragments.into_iter().zip(embeddings).collect();
        let count = rows.len();

        let mut state = self.state.write();
        let records = self.db.replace_fragments(document_id, rows)?;
        state.entries.retain(|e| e.fragment.document_id != document_id);
        // New rowids exceed every existing seq, so appending keeps the order
        state.entries.extend(records);

        tracing::debug!("Indexed {} fragments for document {}", count, document_id);
        Ok(count)
    }

    /// Copy of a document's current fragments and vectors
    pub fn snapshot(&self, document_id: &str) -> Vec<FragmentRecord> {
        self.state
            .read()
            .entries
            .iter()
            .filter(|e| e.fragment.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Replace a document's fragments with an earlier `snapshot`
    pub fn restore(&self, document_id: &str, records: Vec<FragmentRecord>) -> Result<usize> {
        let mut state = self.state.write();
        self.db.restore_fragments(document_id, &records)?;
        let count = records.len();
        state.entries.retain(|e| e.fragment.document_id != document_id);
        state.entries.extend(records);
        state.entries.sort_by_key(|e| e.seq);
        Ok(count)
    }

    /// Remove every fragment of a document, returning how many were removed
    pub fn remove(&self, document_id: &str) -> Result<usize> {
        let mut state = self.state.write();
        let removed = self.db.delete_fragments(document_id)?;
        state.entries.retain(|e| e.fragment.document_id != document_id);
        Ok(removed)
    }

    /// Embed `text` and rank every fragment against it
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredFragment>> {
        self.ensure_current()?;
        let vector = self.embedder.embed(text).await?;
        self.query_vector(&vector, top_k)
    }

    /// Top `top_k` fragments by descending cosine similarity
    ///
    /// Exact ties keep insertion order.
    pub fn query_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredFragment>> {
        self.ensure_current()?;
        self.check_dimensions(vector)?;

        let state = self.state.read();
        let mut scored: Vec<(f32, &FragmentRecord)> = state
            .entries
            .iter()
            .map(|e| (cosine_similarity(vector, &e.embedding), e))
            .collect();
        scored.retain(|(s, _)| !s.is_nan());

        // Stable sort preserves seq order among equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(similarity, e)| ScoredFragment {
                fragment: e.fragment.clone(),
                similarity,
            })
            .collect())
    }

    /// Regenerate the vectors of one document from its stored text
    ///
    /// Returns the number of re-embedded fragments; 0 if the document has no
    /// fragments or was replaced while its vectors were being computed.
    pub async fn reindex_document(&self, document_id: &str) -> Result<usize> {
        let (seqs, texts): (Vec<i64>, Vec<String>) = {
            let state = self.state.read();
            state
                .entries
                .iter()
                .filter(|e| e.fragment.document_id == document_id)
                .map(|e| (e.seq, e.fragment.content.clone()))
                .unzip()
        };
        if seqs.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embedder.embed_batch(&texts).await?;
        for embedding in &embeddings {
            self.check_dimensions(embedding)?;
        }

        let mut state = self.state.write();
        let current: Vec<i64> = state
            .entries
            .iter()
            .filter(|e| e.fragment.document_id == document_id)
            .map(|e| e.seq)
            .collect();
        if current != seqs {
            tracing::debug!("Document {} changed during reindex; skipping", document_id);
            return Ok(0);
        }

        let updates: Vec<(i64, Vec<f32>)> = seqs.into_iter().zip(embeddings).collect();
        self.db.update_embeddings(&updates)?;

        let by_seq: HashMap<i64, Vec<f32>> = updates.into_iter().collect();
        let mut count = 0;
        for entry in state.entries.iter_mut() {
            if let Some(embedding) = by_seq.get(&entry.seq) {
                entry.embedding = embedding.clone();
                count += 1;
            }
        }
        Ok(count)
    }

    /// Clear the stale flag and record the current model, once every vector matches it
    pub fn mark_current(&self) -> Result<bool> {
        let mut state = self.state.write();
        let dims = self.embedder.dimensions();
        if state.entries.iter().any(|e| e.embedding.len() != dims) {
            return Ok(false);
        }
        self.db.set_index_meta(&IndexMeta {
            model: self.embedder.model().to_string(),
            dimensions: dims,
        })?;
        state.stale = false;
        Ok(true)
    }

    /// Whether queries and adds are blocked until a reindex
    pub fn is_stale(&self) -> bool {
        self.state.read().stale
    }

    /// Distinct document ids that own fragments
    pub fn document_ids(&self) -> HashSet<String> {
        self.state
            .read()
            .entries
            .iter()
            .map(|e| e.fragment.document_id.clone())
            .collect()
    }

    /// Fragments owned by one document
    pub fn count_for(&self, document_id: &str) -> usize {
        self.state
            .read()
            .entries
            .iter()
            .filter(|e| e.fragment.document_id == document_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }
}
