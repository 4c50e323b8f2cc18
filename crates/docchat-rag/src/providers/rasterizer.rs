//! PDF page rasterization backed by poppler's `pdftoppm`

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Trait for turning PDF bytes into ordered page images
#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    /// Render every page at `dpi`, returning PNG bytes in page order
    ///
    /// A missing or hung rasterizer is `OcrUnavailable`; the extractor
    /// reports it as `VisionUnavailable` when OCR is disabled.
    async fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<Vec<u8>>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Rasterizer running `pdftoppm -png -r <dpi>`
pub struct PdftoppmRasterizer {
    binary: String,
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: "pdftoppm".to_string(),
            timeout,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl PdfRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<Vec<u8>>> {
        let dir = tempfile::tempdir()?;
        let pdf_path = dir.path().join("input.pdf");
        let prefix = dir.path().join("page");
        tokio::fs::write(&pdf_path, pdf).await?;

        let run = Command::new(&self.binary)
            .args(["-png", "-r", &dpi.to_string()])
            .arg(&pdf_path)
            .arg(&prefix)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Err(_) => {
                return Err(Error::OcrUnavailable(format!(
                    "PDF rasterizer {} timed out after {:?}",
                    self.binary, self.timeout
                )))
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::OcrUnavailable(format!(
                    "PDF rasterizer {} not found",
                    self.binary
                )))
            }
            Ok(Err(e)) => {
                return Err(Error::OcrUnavailable(format!(
                    "PDF rasterizer {} failed to start: {e}",
                    self.binary
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::extraction("pdf", format!("pdftoppm error: {}", stderr.trim())));
        }

        // pdftoppm zero-pads page numbers, so lexical order is page order
        let mut page_paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "png") {
                page_paths.push(path);
            }
        }
        page_paths.sort();

        let mut pages = Vec::with_capacity(page_paths.len());
        for path in page_paths {
            pages.push(tokio::fs::read(&path).await?);
        }

        tracing::debug!("Rasterized {} pages at {} dpi", pages.len(), dpi);
        Ok(pages)
    }

    fn name(&self) -> &str {
        "pdftoppm"
    }
}
