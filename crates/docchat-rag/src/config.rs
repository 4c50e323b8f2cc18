//! Configuration for the document Q&A engine
//!
//! Values come from defaults, an optional TOML file (`DOCCHAT_CONFIG`) and
//! environment variables (a `.env` file is honored), in that order.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Persistence locations
    pub storage: StorageConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Extraction (OCR / vision / spreadsheet / PDF) configuration
    pub extraction: ExtractionConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            max_upload_size: 100 * 1024 * 1024,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root data directory
    pub data_dir: PathBuf,
    /// Directory holding persisted source files (defaults to `<data_dir>/documents`)
    pub documents_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docchat-rag");

        Self {
            data_dir,
            documents_dir: None,
        }
    }
}

impl StorageConfig {
    /// SQLite database path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("docchat.db")
    }

    /// Source file directory
    pub fn documents_path(&self) -> PathBuf {
        self.documents_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("documents"))
    }
}

/// Unit in which chunk size and overlap are counted
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    /// Unicode scalar values
    #[default]
    Chars,
    /// Whitespace-separated words
    Words,
}

impl FromStr for ChunkUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chars" | "characters" => Ok(Self::Chars),
            "words" | "tokens" => Ok(Self::Words),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown chunk unit '{other}'"
            ))),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size
    pub chunk_size: usize,
    /// Overlap between consecutive windows (must be < chunk_size)
    pub chunk_overlap: usize,
    /// Counting unit
    pub unit: ChunkUnit,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            unit: ChunkUnit::Chars,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum number of fragments returned per query
    pub top_k: usize,
    /// Minimum cosine similarity for a fragment to count as relevant
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            similarity_threshold: 0.3,
        }
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Run OCR on images and image-dominant PDFs
    pub ocr_enabled: bool,
    /// Run the vision model on images and image-dominant PDFs
    pub vision_enabled: bool,
    /// Hard cap on data rows emitted per spreadsheet sheet
    pub max_sheet_rows: usize,
    /// Native PDF text shorter than this triggers the rasterize + OCR fallback
    pub pdf_min_text_length: usize,
    /// OCR language set
    pub ocr_languages: Vec<String>,
    /// Rasterization resolution for PDF pages
    pub rasterize_dpi: u32,
    /// Timeout for a single OCR / rasterizer call in seconds
    pub service_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            vision_enabled: false,
            max_sheet_rows: 1000,
            pdf_min_text_length: 50,
            ocr_languages: vec!["eng".to_string()],
            rasterize_dpi: 150,
            service_timeout_secs: 120,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model served by Ollama
    pub model: String,
    /// Vector dimensionality produced by the model
    pub dimensions: usize,
    /// Concurrent embedding requests per document
    pub parallel_requests: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            parallel_requests: 4,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Chat model name
    pub chat_model: String,
    /// Vision-capable model name
    pub vision_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Conversation turns sent along with each request
    pub max_history_turns: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            vision_model: "llava".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
            max_history_turns: 20,
        }
    }
}

impl RagConfig {
    /// Defaults, then `DOCCHAT_CONFIG` TOML file, then environment overrides
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var("DOCCHAT_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            Error::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BACKEND_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("BACKEND_PORT") {
            self.server.port = parse_var("BACKEND_PORT", &v)?;
        }
        if let Some(v) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = split_list(&v);
        }
        if let Some(v) = lookup("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOCUMENTS_DIR") {
            self.storage.documents_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_var("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_var("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("CHUNK_UNIT") {
            self.chunking.unit = v.parse()?;
        }
        if let Some(v) = lookup("RAG_TOP_K") {
            self.retrieval.top_k = parse_var("RAG_TOP_K", &v)?;
        }
        if let Some(v) = lookup("SIMILARITY_THRESHOLD") {
            self.retrieval.similarity_threshold = parse_var("SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("OCR_ENABLED") {
            self.extraction.ocr_enabled = parse_bool("OCR_ENABLED", &v)?;
        }
        if let Some(v) = lookup("VISION_ENABLED") {
            self.extraction.vision_enabled = parse_bool("VISION_ENABLED", &v)?;
        }
        if let Some(v) = lookup("OCR_LANGUAGES") {
            self.extraction.ocr_languages = split_list(&v);
        }
        if let Some(v) = lookup("MAX_SHEET_ROWS") {
            self.extraction.max_sheet_rows = parse_var("MAX_SHEET_ROWS", &v)?;
        }
        if let Some(v) = lookup("PDF_MIN_TEXT_LENGTH") {
            self.extraction.pdf_min_text_length = parse_var("PDF_MIN_TEXT_LENGTH", &v)?;
        }
        if let Some(v) = lookup("SERVICE_TIMEOUT_SECS") {
            self.extraction.service_timeout_secs = parse_var("SERVICE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("EMBEDDING_MODEL") {
            self.embeddings.model = v;
        }
        if let Some(v) = lookup("EMBEDDING_DIMENSIONS") {
            self.embeddings.dimensions = parse_var("EMBEDDING_DIMENSIONS", &v)?;
        }
        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.llm.chat_model = v;
        }
        if let Some(v) = lookup("VISION_MODEL") {
            self.llm.vision_model = v;
        }
        Ok(())
    }

    /// Check configuration invariants; called before any component is built
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfiguration(
                "top_k must be greater than zero".to_string(),
            ));
        }
        let threshold = self.retrieval.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidConfiguration(format!(
                "similarity_threshold {threshold} is outside [-1, 1]"
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::InvalidConfiguration(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfiguration(format!("{name}: cannot parse '{value}'")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidConfiguration(format!(
            "{name}: expected a boolean, got '{value}'"
        ))),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', '+'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
