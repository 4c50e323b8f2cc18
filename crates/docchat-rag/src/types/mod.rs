//! Core types for the document Q&A engine

pub mod conversation;
pub mod document;
pub mod response;

pub use conversation::{Conversation, Role, Turn};
pub use document::{Document, ExtractionStrategy, ExtractionWarning, FileType, Fragment, Modality};
pub use response::{
    ChatRequest, ChatResponse, DocumentList, DocumentStats, HealthStatus, IngestOutcome,
    IngestStatus, ReindexReport, RetrievalResult, ScoredFragment,
};
