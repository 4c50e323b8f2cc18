//! docchat-rag: private document Q&A
//!
//! Uploaded documents (text, Word, spreadsheets, PDF, images) are extracted,
//! chunked and embedded into a persistent index. Questions are answered by a
//! local LLM strictly from retrieved fragments; when nothing relevant is
//! retrieved the engine refuses instead of generating.

pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use engine::{Providers, RagEngine};
pub use error::{Error, IngestStage, Result};
pub use types::{
    ChatRequest, ChatResponse, Document, FileType, Fragment, IngestOutcome, IngestStatus,
    Modality, RetrievalResult,
};
