//! Provider abstractions for the external services the engine consumes
//!
//! Embeddings, generation and vision run on Ollama; OCR and PDF
//! rasterization shell out to tesseract and poppler. OCR, vision and
//! rasterization each have a no-op stub.

pub mod embedding;
pub mod llm;
pub mod noop;
pub mod ocr;
pub mod ollama;
pub mod rasterizer;
pub mod vision;

pub use embedding::EmbeddingProvider;
pub use llm::{ContextFragment, GenerationRequest, LlmProvider};
pub use noop::{NoopOcr, NoopRasterizer, NoopVision};
pub use ocr::{OcrProvider, TesseractOcr};
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider, OllamaVision};
pub use rasterizer::{PdfRasterizer, PdftoppmRasterizer};
pub use vision::VisionProvider;
