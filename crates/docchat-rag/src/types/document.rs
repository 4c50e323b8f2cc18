//! Document and fragment types with provenance for context labeling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Plain text file
    Txt,
    /// Markdown file (extracted as plain text)
    Markdown,
    /// Microsoft Word document (.docx)
    Docx,
    /// Excel spreadsheet (.xlsx)
    Xlsx,
    /// Old Excel spreadsheet (.xls)
    Xls,
    /// OpenDocument Spreadsheet
    Ods,
    /// CSV file (a single sheet)
    Csv,
    /// PDF document
    Pdf,
    /// Raster image (OCR / vision)
    Image,
    /// Unknown file type
    Unknown,
}

/// Extraction strategy a file type is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    PlainText,
    WordProcessor,
    Spreadsheet,
    Pdf,
    Image,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            "docx" => Self::Docx,
            "xlsx" | "xlsm" => Self::Xlsx,
            "xls" => Self::Xls,
            "ods" => Self::Ods,
            "csv" => Self::Csv,
            "pdf" => Self::Pdf,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tiff" | "tif" => Self::Image,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a filename's extension
    pub fn from_filename(filename: &str) -> Self {
        std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Strategy used to extract this file type, `None` when unsupported
    pub fn strategy(&self) -> Option<ExtractionStrategy> {
        match self {
            Self::Txt | Self::Markdown => Some(ExtractionStrategy::PlainText),
            Self::Docx => Some(ExtractionStrategy::WordProcessor),
            Self::Xlsx | Self::Xls | Self::Ods | Self::Csv => Some(ExtractionStrategy::Spreadsheet),
            Self::Pdf => Some(ExtractionStrategy::Pdf),
            Self::Image => Some(ExtractionStrategy::Image),
            Self::Unknown => None,
        }
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        self.strategy().is_some()
    }

    /// Short lowercase name, as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Markdown => "markdown",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Ods => "ods",
            Self::Csv => "csv",
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::Unknown => "unknown",
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Txt => "Text File",
            Self::Markdown => "Markdown",
            Self::Docx => "Word Document (.docx)",
            Self::Xlsx => "Excel Spreadsheet (.xlsx)",
            Self::Xls => "Excel Spreadsheet (.xls)",
            Self::Ods => "OpenDocument Spreadsheet",
            Self::Csv => "CSV",
            Self::Pdf => "PDF",
            Self::Image => "Image",
            Self::Unknown => "Unknown",
        }
    }
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(Self::Markdown),
            "image" => Ok(Self::Image),
            "unknown" => Ok(Self::Unknown),
            other => match Self::from_extension(other) {
                Self::Unknown => Err(Error::storage(format!("unknown file type '{other}'"))),
                ft => Ok(ft),
            },
        }
    }
}

/// How a fragment's text was obtained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Text embedded in the file itself
    #[default]
    NativeText,
    /// Text recognized by OCR
    OcrText,
    /// Description produced by the vision model
    VisionDescription,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NativeText => "native_text",
            Self::OcrText => "ocr_text",
            Self::VisionDescription => "vision_description",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native_text" => Ok(Self::NativeText),
            "ocr_text" => Ok(Self::OcrText),
            "vision_description" => Ok(Self::VisionDescription),
            other => Err(Error::storage(format!("unknown modality '{other}'"))),
        }
    }
}

/// A registered document
///
/// The id is the SHA-256 fingerprint of the uploaded bytes, so a repeat
/// upload of the same content resolves to the same document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Content fingerprint (hex SHA-256)
    pub id: String,
    /// Original filename as uploaded by user
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// Declared media type
    pub media_type: String,
    /// File size in bytes
    pub file_size: u64,
    /// Number of fragments in the index owned by this document
    pub fragment_count: usize,
    /// First upload timestamp
    pub uploaded_at: DateTime<Utc>,
    /// Last (re-)ingestion timestamp
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: String, filename: String, file_size: u64, fragment_count: usize) -> Self {
        let now = Utc::now();
        let media_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Self {
            id,
            file_type: FileType::from_filename(&filename),
            filename,
            media_type,
            file_size,
            fragment_count,
            uploaded_at: now,
            updated_at: now,
        }
    }
}

/// A bounded slice of document text, the unit that gets embedded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fragment {
    /// Owning document id
    pub document_id: String,
    /// Source filename, used to label context for generation
    pub filename: String,
    /// Position within the document (0-based)
    pub chunk_index: usize,
    /// Fragment text
    pub content: String,
    /// Source modality
    pub modality: Modality,
}

/// Non-fatal failure while extracting one page, sheet or image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionWarning {
    /// Page, sheet or section that failed
    pub location: String,
    /// What went wrong
    pub message: String,
}

impl ExtractionWarning {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}
