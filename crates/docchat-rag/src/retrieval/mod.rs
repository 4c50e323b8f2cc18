//! Embedding index and threshold-gated retrieval

pub mod index;
pub mod search;

pub use index::{cosine_similarity, EmbeddingIndex};
pub use search::Retriever;
