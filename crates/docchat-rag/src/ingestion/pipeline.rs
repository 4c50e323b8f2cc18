//! Ingestion pipeline orchestration: extract, then chunk into fragments

use sha2::{Digest, Sha256};

use crate::error::{IngestStage, Result};
use crate::types::{ExtractionWarning, Fragment};

use super::chunker::TextChunker;
use super::parser::FormatExtractor;

/// Hex SHA-256 of the raw bytes; the document id
pub fn fingerprint(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Fragments ready for indexing
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub fragments: Vec<Fragment>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Main ingestion pipeline
pub struct IngestPipeline {
    extractor: FormatExtractor,
    chunker: TextChunker,
}

impl IngestPipeline {
    pub fn new(extractor: FormatExtractor, chunker: TextChunker) -> Self {
        Self { extractor, chunker }
    }

    pub fn extractor(&self) -> &FormatExtractor {
        &self.extractor
    }

    /// Extract and chunk one document; errors carry the failing stage
    pub async fn process(
        &self,
        document_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<ProcessedDocument> {
        let extracted = self
            .extractor
            .extract(filename, data)
            .await
            .map_err(|e| e.at_stage(filename, IngestStage::Extraction))?;

        let fragments: Vec<Fragment> = self
            .chunker
            .chunk(&extracted.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, chunk)| Fragment {
                document_id: document_id.to_string(),
                filename: filename.to_string(),
                chunk_index,
                modality: extracted.modality_at(chunk.offset),
                content: chunk.content,
            })
            .collect();

        tracing::info!(
            "Processed {}: {} fragments from {} units",
            filename,
            fragments.len(),
            extracted.units
        );

        Ok(ProcessedDocument {
            fragments,
            warnings: extracted.warnings,
        })
    }
}
