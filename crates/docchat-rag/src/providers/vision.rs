//! Vision capability: image in, description out

use async_trait::async_trait;

use crate::error::Result;

/// Trait for describing images with a vision model
///
/// `Error::VisionUnavailable` means the service could not be reached;
/// `Error::Extraction` means this particular image could not be described.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Describe one encoded image (PNG, JPEG, ...)
    async fn describe(&self, image: &[u8]) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
