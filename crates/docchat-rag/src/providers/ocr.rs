//! OCR capability backed by the tesseract CLI

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Trait for recognizing text in images
///
/// An empty string is a valid result. `Error::OcrUnavailable` means the
/// engine itself is missing or hung; `Error::Extraction` means this image
/// could not be read.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Recognize text in one encoded image using the given language set
    async fn recognize(&self, image: &[u8], languages: &[String]) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// OCR through an external `tesseract` process
pub struct TesseractOcr {
    binary: String,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: "tesseract".to_string(),
            timeout,
        }
    }

    /// Use a tesseract binary other than the one on `PATH`
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl OcrProvider for TesseractOcr {
    async fn recognize(&self, image: &[u8], languages: &[String]) -> Result<String> {
        let dir = tempfile::tempdir()?;
        let image_path = dir.path().join("input.png");
        tokio::fs::write(&image_path, image).await?;

        let langs = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        let run = Command::new(&self.binary)
            .arg(&image_path)
            .arg("stdout")
            .args(["-l", &langs])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Err(_) => {
                return Err(Error::OcrUnavailable(format!(
                    "{} timed out after {:?}",
                    self.binary, self.timeout
                )))
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::OcrUnavailable(format!("{} not found", self.binary)))
            }
            Ok(Err(e)) => return Err(Error::OcrUnavailable(e.to_string())),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::extraction("image", format!("tesseract error: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!("OCR recognized {} characters", text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
