//! Error types for the document Q&A engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ingestion stage at which a document failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStage {
    Extraction,
    Chunking,
    Embedding,
    Indexing,
    Storage,
    Registration,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extraction => "extraction",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Indexing => "indexing",
            Self::Storage => "storage",
            Self::Registration => "registration",
        };
        f.write_str(name)
    }
}

/// Engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown or unsupported file extension
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Configuration violates an invariant (overlap >= chunk size, dimension mismatch, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A single page, sheet or image could not be extracted
    #[error("Extraction failed for {location}: {message}")]
    Extraction { location: String, message: String },

    /// Embedding service unreachable
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Generation service unreachable
    #[error("Generation service unavailable: {0}")]
    GenerationUnavailable(String),

    /// OCR service unreachable
    #[error("OCR service unavailable: {0}")]
    OcrUnavailable(String),

    /// Vision service unreachable
    #[error("Vision service unavailable: {0}")]
    VisionUnavailable(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Malformed request (missing upload field, empty message)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Ingestion aborted at a given stage
    #[error("Ingestion of '{filename}' failed during {stage}: {source}")]
    Ingest {
        filename: String,
        stage: IngestStage,
        #[source]
        source: Box<Error>,
    },

    /// Persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an extraction error for one page/sheet/image
    pub fn extraction(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap an error with the ingestion stage that produced it
    pub fn at_stage(self, filename: impl Into<String>, stage: IngestStage) -> Self {
        Self::Ingest {
            filename: filename.into(),
            stage,
            source: Box::new(self),
        }
    }

    /// Innermost error, unwrapping ingestion stage wrappers
    pub fn root(&self) -> &Error {
        match self {
            Self::Ingest { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the caller may retry (an external service was unreachable)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Self::EmbeddingUnavailable(_)
                | Self::GenerationUnavailable(_)
                | Self::OcrUnavailable(_)
                | Self::VisionUnavailable(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let stage = match &self {
            Error::Ingest { stage, .. } => Some(*stage),
            _ => None,
        };

        let (status, error_type) = match self.root() {
            Error::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
            Error::InvalidConfiguration(_) => (StatusCode::BAD_REQUEST, "invalid_configuration"),
            Error::Extraction { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "extraction_error"),
            Error::EmbeddingUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable"),
            Error::GenerationUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable")
            }
            Error::OcrUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "ocr_unavailable"),
            Error::VisionUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "vision_unavailable"),
            Error::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Ingest { .. } | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "stage": stage,
                "retryable": self.is_retryable(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_stages() {
        let err = Error::EmbeddingUnavailable("connection refused".into())
            .at_stage("report.pdf", IngestStage::Embedding);

        assert!(matches!(err.root(), Error::EmbeddingUnavailable(_)));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("embedding"));
        assert!(err.to_string().contains("report.pdf"));
    }

    #[test]
    fn test_not_retryable() {
        assert!(!Error::UnsupportedFormat("exe".into()).is_retryable());
        assert!(!Error::DocumentNotFound("abc".into()).is_retryable());
    }

    #[test]
    fn test_status_mapping() {
        let resp = Error::DocumentNotFound("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = Error::GenerationUnavailable("down".into()).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = Error::UnsupportedFormat("exe".into())
            .at_stage("a.exe", IngestStage::Extraction)
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
