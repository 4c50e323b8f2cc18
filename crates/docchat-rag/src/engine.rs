//! The engine: owns every component and their lifecycle
//!
//! Built once at process start and passed explicitly to the HTTP layer.
//! Writes to one document (ingest, delete, reindex) are serialized by a
//! per-document lock; everything else runs concurrently.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, IngestStage, Result};
use crate::generation::{AnswerOrchestrator, ConversationStore};
use crate::ingestion::{fingerprint, FormatExtractor, IngestPipeline, TextChunker};
use crate::providers::{
    EmbeddingProvider, LlmProvider, NoopOcr, NoopRasterizer, NoopVision, OcrProvider,
    OllamaProvider, PdfRasterizer, PdftoppmRasterizer, TesseractOcr, VisionProvider,
};
use crate::retrieval::{EmbeddingIndex, Retriever};
use crate::storage::{Database, DocumentLocks, DocumentRegistry, SourceStore};
use crate::types::{
    ChatRequest, ChatResponse, Document, DocumentList, DocumentStats, HealthStatus,
    IngestOutcome, IngestStatus, ReindexReport,
};

/// External capabilities the engine is built on
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub ocr: Arc<dyn OcrProvider>,
    pub vision: Arc<dyn VisionProvider>,
    pub rasterizer: Arc<dyn PdfRasterizer>,
}

impl Providers {
    /// Ollama for embeddings, generation and vision; tesseract and pdftoppm for OCR
    ///
    /// Disabled OCR or vision get the no-op stubs.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let ollama = OllamaProvider::new(&config.llm, &config.embeddings)?;
        let extraction = &config.extraction;
        let timeout = Duration::from_secs(extraction.service_timeout_secs);

        let ocr: Arc<dyn OcrProvider> = if extraction.ocr_enabled {
            Arc::new(TesseractOcr::new(timeout))
        } else {
            Arc::new(NoopOcr)
        };
        let vision: Arc<dyn VisionProvider> = if extraction.vision_enabled {
            Arc::new(ollama.vision)
        } else {
            Arc::new(NoopVision)
        };
        let rasterizer: Arc<dyn PdfRasterizer> =
            if extraction.ocr_enabled || extraction.vision_enabled {
                Arc::new(PdftoppmRasterizer::new(timeout))
            } else {
                Arc::new(NoopRasterizer)
            };

        Ok(Self {
            embedder: Arc::new(ollama.embedder),
            llm: Arc::new(ollama.llm),
            ocr,
            vision,
            rasterizer,
        })
    }
}

/// Document Q&A engine
pub struct RagEngine {
    config: RagConfig,
    registry: Arc<DocumentRegistry>,
    index: Arc<EmbeddingIndex>,
    pipeline: IngestPipeline,
    sources: SourceStore,
    locks: DocumentLocks,
    orchestrator: AnswerOrchestrator,
    llm: Arc<dyn LlmProvider>,
}

impl RagEngine {
    /// Build the engine with the configured external services
    pub fn new(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let providers = Providers::from_config(&config)?;
        Self::with_providers(config, providers)
    }

    /// Build the engine on explicit providers
    pub fn with_providers(config: RagConfig, providers: Providers) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::open(config.storage.database_path())?);
        let index = Arc::new(EmbeddingIndex::open(db.clone(), providers.embedder)?);
        let registry = Arc::new(DocumentRegistry::new(db));
        let sources = SourceStore::new(config.storage.documents_path())?;

        let extractor = FormatExtractor::new(
            config.extraction.clone(),
            providers.ocr,
            providers.vision,
            providers.rasterizer,
        );
        let pipeline = IngestPipeline::new(extractor, TextChunker::from_config(&config.chunking)?);

        let retriever = Arc::new(Retriever::new(index.clone(), &config.retrieval));
        let orchestrator = AnswerOrchestrator::new(
            registry.clone(),
            retriever,
            providers.llm.clone(),
            Arc::new(ConversationStore::new()),
            config.llm.max_history_turns,
        );

        tracing::info!(
            "Engine ready: {} fragments indexed, data dir {}",
            index.len(),
            config.storage.data_dir.display()
        );
        if index.is_stale() {
            tracing::warn!("Embedding configuration changed; run a reindex before querying");
        }

        Ok(Self {
            config,
            registry,
            index,
            pipeline,
            sources,
            locks: DocumentLocks::new(),
            orchestrator,
            llm: providers.llm,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Ingest one uploaded file
    ///
    /// A known fingerprint returns the existing document unless `force`
    /// is set, in which case it is re-extracted under the same id. A failed
    /// stage leaves the index and registry as they were before the call.
    pub async fn ingest(&self, filename: &str, data: &[u8], force: bool) -> Result<IngestOutcome> {
        FormatExtractor::detect(filename)?;

        let id = fingerprint(data);
        let _guard = self.locks.acquire(&id).await;

        let existing = self
            .registry
            .exists(&id)
            .map_err(|e| e.at_stage(filename, IngestStage::Registration))?;
        if let Some(document) = &existing {
            if !force {
                tracing::info!(
                    "Skipping {}: identical content already ingested as {}",
                    filename,
                    document.filename
                );
                return Ok(IngestOutcome {
                    status: IngestStatus::Duplicate,
                    document: document.clone(),
                    warnings: Vec::new(),
                });
            }
            tracing::info!("Re-processing {} ({})", filename, id);
        }
        let is_new = existing.is_none();

        let processed = self.pipeline.process(&id, filename, data).await?;

        if let Err(e) = self.sources.save(&id, filename, data).await {
            if is_new {
                self.discard_source(&id).await;
            }
            return Err(e.at_stage(filename, IngestStage::Storage));
        }

        let previous = if is_new { Vec::new() } else { self.index.snapshot(&id) };
        let count = match self.index.add(&id, processed.fragments).await {
            Ok(count) => count,
            Err(e) => {
                if is_new {
                    self.discard_source(&id).await;
                }
                let stage = match e {
                    Error::EmbeddingUnavailable(_) => IngestStage::Embedding,
                    _ => IngestStage::Indexing,
                };
                return Err(e.at_stage(filename, stage));
            }
        };

        let mut document = Document::new(id.clone(), filename.to_string(), data.len() as u64, count);
        if let Some(existing) = &existing {
            document.uploaded_at = existing.uploaded_at;
        }
        if let Err(e) = self.registry.register(&document) {
            if is_new {
                self.rollback(&id).await;
            } else if let Err(restore) = self.index.restore(&id, previous) {
                tracing::error!("Restoring earlier fragments of {} failed: {}", id, restore);
            }
            return Err(e.at_stage(filename, IngestStage::Registration));
        }

        tracing::info!(
            "Ingested {} as {}: {} fragments, {} warnings",
            filename,
            id,
            count,
            processed.warnings.len()
        );

        Ok(IngestOutcome {
            status: if is_new {
                IngestStatus::Ingested
            } else {
                IngestStatus::Reprocessed
            },
            document,
            warnings: processed.warnings,
        })
    }

    /// Undo the index and source writes of a failed first ingestion
    async fn rollback(&self, id: &str) {
        if let Err(e) = self.index.remove(id) {
            tracing::error!("Rollback of fragments for {} failed: {}", id, e);
        }
        self.discard_source(id).await;
    }

    async fn discard_source(&self, id: &str) {
        if let Err(e) = self.sources.delete(id).await {
            tracing::error!("Rollback of source file for {} failed: {}", id, e);
        }
    }

    /// Delete a document, its fragments and its stored source file
    pub async fn delete(&self, id: &str) -> Result<Document> {
        let _guard = self.locks.acquire(id).await;
        let document = self.registry.get(id)?;

        let removed = self.index.remove(id)?;
        self.registry.delete(id)?;
        if let Err(e) = self.sources.delete(id).await {
            tracing::warn!("Could not remove source file for {}: {}", id, e);
        }

        tracing::info!("Deleted {} ({}): {} fragments", document.filename, id, removed);
        Ok(document)
    }

    pub fn get(&self, id: &str) -> Result<Document> {
        self.registry.get(id)
    }

    /// Documents newest first, with totals
    pub fn list(&self) -> Result<DocumentList> {
        Ok(DocumentList {
            documents: self.registry.list()?,
            stats: self.registry.stats()?,
        })
    }

    pub fn stats(&self) -> Result<DocumentStats> {
        self.registry.stats()
    }

    /// Fragments currently in the index
    pub fn fragment_count(&self) -> usize {
        self.index.len()
    }

    /// Re-embed every document from its stored fragment text
    ///
    /// Fragments whose document is no longer registered are purged. Each
    /// document is locked only while its own vectors are replaced.
    pub async fn reindex_all(&self) -> Result<ReindexReport> {
        let mut report = ReindexReport::default();
        let documents = self.registry.list()?;
        tracing::info!("Reindexing {} documents", documents.len());

        for document in &documents {
            let _guard = self.locks.acquire(&document.id).await;
            if self.registry.exists(&document.id)?.is_none() {
                tracing::debug!("{} was deleted before its turn; skipping", document.id);
                continue;
            }
            let count = self.index.reindex_document(&document.id).await?;
            report.documents_reindexed += 1;
            report.fragments_reembedded += count;
        }

        let registered: HashSet<String> = documents.into_iter().map(|d| d.id).collect();
        for orphan in self.index.document_ids() {
            if registered.contains(&orphan) {
                continue;
            }
            let _guard = self.locks.acquire(&orphan).await;
            if self.registry.exists(&orphan)?.is_some() {
                continue;
            }
            let removed = self.index.remove(&orphan)?;
            tracing::warn!("Purged {} orphaned fragments of {}", removed, orphan);
            report.orphans_removed += removed;
        }

        if !self.index.mark_current()? {
            tracing::warn!("Some vectors still have stale dimensions after reindex");
        }

        tracing::info!(
            "Reindex complete: {} documents, {} fragments, {} orphans removed",
            report.documents_reindexed,
            report.fragments_reembedded,
            report.orphans_removed
        );
        Ok(report)
    }

    /// Answer one chat message
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.respond(request.conversation_id.as_deref(), &request.message).await
    }

    pub async fn respond(&self, conversation_id: Option<&str>, text: &str) -> Result<ChatResponse> {
        self.orchestrator.respond(conversation_id, text).await
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        self.orchestrator.conversations()
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let generation_available = self.llm.health_check().await;
        let stats = self.registry.stats()?;
        Ok(HealthStatus {
            status: (if generation_available { "healthy" } else { "degraded" }).to_string(),
            generation_available,
            chat_model: self.llm.model().to_string(),
            embedding_model: self.index.embedder().model().to_string(),
            documents: stats.total_documents,
            fragments: self.index.len(),
        })
    }

    pub async fn available_models(&self) -> Vec<String> {
        self.llm.available_models().await
    }

    /// Tear down in-memory state; persisted documents are untouched
    pub fn shutdown(&self) {
        self.conversations().shutdown();
        tracing::info!("Engine shut down");
    }
}
