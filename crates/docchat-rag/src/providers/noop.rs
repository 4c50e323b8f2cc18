//! No-op capability stubs
//!
//! Used when OCR or vision is disabled, and to keep the engine testable
//! without tesseract, poppler or a vision model installed.

use async_trait::async_trait;

use crate::error::Result;

use super::ocr::OcrProvider;
use super::rasterizer::PdfRasterizer;
use super::vision::VisionProvider;

/// OCR stub that recognizes nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOcr;

#[async_trait]
impl OcrProvider for NoopOcr {
    async fn recognize(&self, _image: &[u8], _languages: &[String]) -> Result<String> {
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Vision stub that describes nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVision;

#[async_trait]
impl VisionProvider for NoopVision {
    async fn describe(&self, _image: &[u8]) -> Result<String> {
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Rasterizer stub that renders no pages
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRasterizer;

#[async_trait]
impl PdfRasterizer for NoopRasterizer {
    async fn rasterize(&self, _pdf: &[u8], _dpi: u32) -> Result<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}
