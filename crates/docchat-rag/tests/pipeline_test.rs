//! Integration tests for the full engine.
//!
//! Tests the complete flow: extract → chunk → embed → register → retrieve → answer,
//! with deterministic keyword embeddings and a recording generator.

use async_trait::async_trait;
use docchat_rag::config::{ChunkUnit, RagConfig};
use docchat_rag::generation::{NOT_COVERED_REPLY, NO_DOCUMENTS_REPLY};
use docchat_rag::providers::{
    EmbeddingProvider, GenerationRequest, LlmProvider, NoopOcr, NoopRasterizer, NoopVision,
};
use docchat_rag::{Error, IngestStage, IngestStatus, Providers, RagEngine, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tokio::sync::Notify;

const TOPICS: &[&[&str]] = &[
    &["car", "color", "red", "vehicle"],
    &["sales", "revenue", "region", "quarter", "amount"],
    &["invoice", "payment", "due"],
    &["alpha"],
];

/// Mock embedder: one axis per topic, plus a catch-all axis for text with no topic words
struct KeywordEmbedder {
    model: &'static str,
}

impl KeywordEmbedder {
    fn new() -> Self {
        Self { model: "keyword-v1" }
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; TOPICS.len() + 1];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            for (axis, topic) in TOPICS.iter().enumerate() {
                if topic.contains(&word) {
                    vector[axis] += 1.0;
                }
            }
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[TOPICS.len()] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        TOPICS.len() + 1
    }

    fn model(&self) -> &str {
        self.model
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Blocks embedding of "alpha" text while `hold` is set
struct GatedEmbedder {
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.hold.load(Ordering::SeqCst) && text.contains("alpha") {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(KeywordEmbedder::vector(text))
    }

    fn dimensions(&self) -> usize {
        TOPICS.len() + 1
    }

    fn model(&self) -> &str {
        "keyword-v1"
    }

    fn name(&self) -> &str {
        "gated"
    }
}

struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::EmbeddingUnavailable("connection refused".into()))
    }

    fn dimensions(&self) -> usize {
        TOPICS.len() + 1
    }

    fn model(&self) -> &str {
        "keyword-v1"
    }

    fn name(&self) -> &str {
        "down"
    }
}

/// Mock generator that records every request it receives
#[derive(Default)]
struct MockGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LlmProvider for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().push(request.clone());
        let first = request
            .context
            .first()
            .map(|c| c.filename.clone())
            .unwrap_or_default();
        Ok(format!("According to {first}, the answer is in the documents."))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-chat"
    }
}

fn test_config(dir: &TempDir) -> RagConfig {
    let mut config = RagConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.storage.documents_dir = None;
    config.chunking.chunk_size = 500;
    config.chunking.chunk_overlap = 50;
    config.chunking.unit = ChunkUnit::Chars;
    config.retrieval.top_k = 3;
    config.retrieval.similarity_threshold = 0.3;
    config.extraction.ocr_enabled = false;
    config.extraction.vision_enabled = false;
    config
}

fn engine_with(
    dir: &TempDir,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<MockGenerator>,
) -> RagEngine {
    let providers = Providers {
        embedder,
        llm: generator,
        ocr: Arc::new(NoopOcr),
        vision: Arc::new(NoopVision),
        rasterizer: Arc::new(NoopRasterizer),
    };
    RagEngine::with_providers(test_config(dir), providers).unwrap()
}

fn new_engine(dir: &TempDir) -> (RagEngine, Arc<MockGenerator>) {
    let generator = Arc::new(MockGenerator::default());
    let engine = engine_with(dir, Arc::new(KeywordEmbedder::new()), generator.clone());
    (engine, generator)
}

/// Single-page PDF with one line of native text
fn tiny_pdf(text: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

#[tokio::test]
async fn test_fragment_count_matches_chunks_and_delete_removes_them() {
    let dir = tempdir().unwrap();
    let (engine, _) = new_engine(&dir);

    let text = "x".repeat(1200);
    let outcome = engine.ingest("long.txt", text.as_bytes(), false).await.unwrap();

    assert_eq!(outcome.status, IngestStatus::Ingested);
    assert_eq!(outcome.document.fragment_count, 3);
    assert_eq!(engine.fragment_count(), 3);
    assert_eq!(engine.stats().unwrap().total_fragments, 3);

    let deleted = engine.delete(&outcome.document.id).await.unwrap();
    assert_eq!(deleted.filename, "long.txt");
    assert_eq!(engine.fragment_count(), 0);
    assert!(matches!(
        engine.get(&outcome.document.id),
        Err(Error::DocumentNotFound(_))
    ));
    assert!(!dir.path().join("documents").join(&outcome.document.id).exists());
}

#[tokio::test]
async fn test_reupload_is_deduplicated() {
    let dir = tempdir().unwrap();
    let (engine, _) = new_engine(&dir);

    let first = engine
        .ingest("cars.txt", b"The car is red.", false)
        .await
        .unwrap();
    let before = engine.fragment_count();
    let uploaded_at = engine.get(&first.document.id).unwrap().uploaded_at;

    let again = engine
        .ingest("renamed.txt", b"The car is red.", false)
        .await
        .unwrap();
    assert_eq!(again.status, IngestStatus::Duplicate);
    assert_eq!(again.document.id, first.document.id);
    assert_eq!(again.document.filename, "cars.txt");
    assert_eq!(engine.fragment_count(), before);

    let forced = engine
        .ingest("cars.txt", b"The car is red.", true)
        .await
        .unwrap();
    assert_eq!(forced.status, IngestStatus::Reprocessed);
    assert_eq!(forced.document.id, first.document.id);
    assert_eq!(forced.document.uploaded_at, uploaded_at);
    assert_eq!(engine.fragment_count(), before);
    assert_eq!(engine.list().unwrap().documents.len(), 1);
}

#[tokio::test]
async fn test_empty_index_refuses_without_generation() {
    let dir = tempdir().unwrap();
    let (engine, generator) = new_engine(&dir);

    let reply = engine.respond(None, "What color is the car?").await.unwrap();
    assert_eq!(reply.response, NO_DOCUMENTS_REPLY);
    assert!(reply.sources.is_empty());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_unrelated_spreadsheet_gets_refusal() {
    let dir = tempdir().unwrap();
    let (engine, generator) = new_engine(&dir);

    let csv = "region,quarter,revenue\nnorth,Q1,1200\nsouth,Q1,900\n";
    let outcome = engine.ingest("sales.csv", csv.as_bytes(), false).await.unwrap();
    assert_eq!(outcome.document.fragment_count, 1);

    let reply = engine.respond(None, "What color is the car?").await.unwrap();
    assert_eq!(reply.response, NOT_COVERED_REPLY);
    assert!(reply.sources.is_empty());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_grounded_answer_with_history() {
    let dir = tempdir().unwrap();
    let (engine, generator) = new_engine(&dir);

    engine
        .ingest("cars.txt", b"The car is red. It is a small vehicle.", false)
        .await
        .unwrap();
    engine
        .ingest("sales.csv", b"region,revenue\nnorth,10\n", false)
        .await
        .unwrap();

    let first = engine.respond(None, "What color is the car?").await.unwrap();
    assert!(first.conversation_id.starts_with("conv_"));
    assert_eq!(first.sources, vec!["cars.txt".to_string()]);
    assert_eq!(first.response, "According to cars.txt, the answer is in the documents.");

    let second = engine
        .respond(Some(&first.conversation_id), "Is the car a vehicle?")
        .await
        .unwrap();
    assert_eq!(second.conversation_id, first.conversation_id);

    let requests = generator.requests.lock();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].history.is_empty());
    assert_eq!(requests[1].history.len(), 2);
    assert!(requests[1]
        .context
        .iter()
        .all(|c| c.filename == "cars.txt"));
}

#[tokio::test]
async fn test_tiny_pdf_without_ocr_is_not_an_error() {
    let dir = tempdir().unwrap();
    let (engine, _) = new_engine(&dir);

    let outcome = engine
        .ingest("scan.pdf", &tiny_pdf("Tiny note!"), false)
        .await
        .unwrap();
    assert_eq!(outcome.status, IngestStatus::Ingested);
    assert!(outcome.document.fragment_count <= 1);
}

#[tokio::test]
async fn test_unsupported_format_persists_nothing() {
    let dir = tempdir().unwrap();
    let (engine, _) = new_engine(&dir);

    let err = engine.ingest("setup.exe", b"MZ\x90\x00", false).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
    assert!(engine.list().unwrap().documents.is_empty());
    assert_eq!(engine.fragment_count(), 0);
}

#[tokio::test]
async fn test_embedding_outage_leaves_nothing_behind() {
    let dir = tempdir().unwrap();
    let generator = Arc::new(MockGenerator::default());
    let engine = engine_with(&dir, Arc::new(DownEmbedder), generator);

    let err = engine
        .ingest("cars.txt", b"The car is red.", false)
        .await
        .unwrap_err();
    match &err {
        Error::Ingest { stage, .. } => assert_eq!(*stage, IngestStage::Embedding),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_retryable());
    assert!(engine.list().unwrap().documents.is_empty());
    assert_eq!(engine.fragment_count(), 0);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempdir().unwrap();
    let id = {
        let (engine, _) = new_engine(&dir);
        let outcome = engine
            .ingest("cars.txt", b"The car is red.", false)
            .await
            .unwrap();
        engine.shutdown();
        outcome.document.id
    };

    let (engine, generator) = new_engine(&dir);
    assert_eq!(engine.get(&id).unwrap().filename, "cars.txt");
    assert_eq!(engine.fragment_count(), 1);
    assert!(dir.path().join("documents").join(&id).join("cars.txt").exists());

    let reply = engine.respond(None, "What color is the car?").await.unwrap();
    assert_eq!(reply.sources, vec!["cars.txt".to_string()]);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_model_change_requires_reindex() {
    let dir = tempdir().unwrap();
    {
        let (engine, _) = new_engine(&dir);
        engine
            .ingest("cars.txt", b"The car is red.", false)
            .await
            .unwrap();
    }

    let generator = Arc::new(MockGenerator::default());
    let engine = engine_with(
        &dir,
        Arc::new(KeywordEmbedder { model: "keyword-v2" }),
        generator.clone(),
    );

    let err = engine.respond(None, "What color is the car?").await.unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)));

    let report = engine.reindex_all().await.unwrap();
    assert_eq!(report.documents_reindexed, 1);
    assert_eq!(report.fragments_reembedded, 1);
    assert_eq!(report.orphans_removed, 0);

    let reply = engine.respond(None, "What color is the car?").await.unwrap();
    assert_eq!(reply.sources, vec!["cars.txt".to_string()]);
}

#[tokio::test]
async fn test_delete_during_reindex_of_another_document() {
    let dir = tempdir().unwrap();
    let gated = Arc::new(GatedEmbedder {
        hold: AtomicBool::new(false),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let generator = Arc::new(MockGenerator::default());
    let engine = Arc::new(engine_with(&dir, gated.clone(), generator));

    let kept = engine
        .ingest("alpha.txt", b"alpha car notes", false)
        .await
        .unwrap()
        .document;
    let doomed = engine
        .ingest("sales.csv", b"region,revenue\nnorth,10\n", false)
        .await
        .unwrap()
        .document;
    assert_eq!(engine.fragment_count(), 2);

    gated.hold.store(true, Ordering::SeqCst);
    let reindex = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.reindex_all().await })
    };

    // The reindex is now parked inside alpha.txt's embedding call
    gated.entered.notified().await;
    engine.delete(&doomed.id).await.unwrap();
    assert!(matches!(engine.get(&doomed.id), Err(Error::DocumentNotFound(_))));

    gated.hold.store(false, Ordering::SeqCst);
    gated.release.notify_one();
    let report = reindex.await.unwrap().unwrap();

    assert_eq!(report.orphans_removed, 0);
    assert_eq!(engine.fragment_count(), 1);
    assert_eq!(engine.get(&kept.id).unwrap().fragment_count, 1);

    let reply = engine.respond(None, "Tell me about the car").await.unwrap();
    assert_eq!(reply.sources, vec!["alpha.txt".to_string()]);
}

#[tokio::test]
async fn test_failed_reprocess_keeps_registry_and_index_in_step() {
    let dir = tempdir().unwrap();
    let id = {
        let (engine, _) = new_engine(&dir);
        let text = "x".repeat(1200);
        let outcome = engine.ingest("long.txt", text.as_bytes(), false).await.unwrap();
        assert_eq!(outcome.document.fragment_count, 3);
        outcome.document.id
    };

    // A plain file where the source directory should be makes the save fail
    let source_dir = dir.path().join("documents").join(&id);
    std::fs::remove_dir_all(&source_dir).unwrap();
    std::fs::write(&source_dir, b"in the way").unwrap();

    let mut config = test_config(&dir);
    config.chunking.chunk_size = 100;
    config.chunking.chunk_overlap = 10;
    let providers = Providers {
        embedder: Arc::new(KeywordEmbedder::new()),
        llm: Arc::new(MockGenerator::default()),
        ocr: Arc::new(NoopOcr),
        vision: Arc::new(NoopVision),
        rasterizer: Arc::new(NoopRasterizer),
    };
    let engine = RagEngine::with_providers(config, providers).unwrap();

    let text = "x".repeat(1200);
    let err = engine.ingest("long.txt", text.as_bytes(), true).await.unwrap_err();
    match &err {
        Error::Ingest { stage, .. } => assert_eq!(*stage, IngestStage::Storage),
        other => panic!("unexpected error: {other:?}"),
    }

    let registered = engine.get(&id).unwrap().fragment_count;
    assert_eq!(registered, 3);
    assert_eq!(engine.fragment_count(), registered);
    assert_eq!(engine.stats().unwrap().total_fragments, registered);
}
