//! Document ingestion: format extraction and chunking

mod chunker;
mod parser;
mod pipeline;

pub use chunker::{TextChunk, TextChunker};
pub use parser::{ExtractedText, FormatExtractor, ModalitySpan};
pub use pipeline::{fingerprint, IngestPipeline, ProcessedDocument};
