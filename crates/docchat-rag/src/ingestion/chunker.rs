//! Sliding-window text chunking

use crate::config::{ChunkUnit, ChunkingConfig};
use crate::error::{Error, Result};

/// One window of chunked text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Window text
    pub content: String,
    /// Byte offset of the window start in the source text
    pub offset: usize,
}

/// Text chunker with configurable size and overlap
///
/// Windows of `chunk_size` units advance by `chunk_size - overlap`; the
/// final window may be shorter. Chunking stops at the first window that
/// reaches the end of the text.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Window size in units
    chunk_size: usize,
    /// Overlap between consecutive windows
    overlap: usize,
    /// Counting unit
    unit: ChunkUnit,
}

impl TextChunker {
    /// Create a new chunker, rejecting `overlap >= chunk_size`
    pub fn new(chunk_size: usize, overlap: usize, unit: ChunkUnit) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk overlap ({overlap}) must be less than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
            unit,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap, config.unit)
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Split text into ordered windows; whitespace-only text yields none
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        match self.unit {
            ChunkUnit::Chars => self.chunk_chars(text),
            ChunkUnit::Words => self.chunk_words(text),
        }
    }

    fn chunk_chars(&self, text: &str) -> Vec<TextChunk> {
        // boundaries[i] is the byte offset of char i; the last entry is text.len()
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = boundaries.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(total);
            chunks.push(TextChunk {
                content: text[boundaries[start]..boundaries[end]].to_string(),
                offset: boundaries[start],
            });
            if end == total {
                break;
            }
            start += self.step();
        }
        chunks
    }

    fn chunk_words(&self, text: &str) -> Vec<TextChunk> {
        let words = word_spans(text);
        let total = words.len();

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(total);
            let content = words[start..end]
                .iter()
                .map(|&(s, e)| &text[s..e])
                .collect::<Vec<_>>()
                .join(" ");
            chunks.push(TextChunk {
                content,
                offset: words[start].0,
            });
            if end == total {
                break;
            }
            start += self.step();
        }
        chunks
    }
}

/// Byte ranges of whitespace-separated words
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut current: Option<usize> = None;

    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), current) {
            (true, Some(start)) => {
                spans.push((start, i));
                current = None;
            }
            (false, None) => current = Some(i),
            _ => {}
        }
    }
    if let Some(start) = current {
        spans.push((start, text.len()));
    }
    spans
}
