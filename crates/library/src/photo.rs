//! Hook for pulling photo metadata out of uploads.
//!
//! Parsing EXIF (or anything else) is left to implementors; the upload
//! only needs the result. Extraction is best-effort: a failing extractor is
//! logged and the upload carries on without metadata.

use crate::error::Result;
use async_trait::async_trait;
use hoard_cache::PhotoMetadata;
use std::path::Path;
use std::sync::Arc;

pub type ExtractorHandle = Arc<dyn PhotoExtractor + Send + Sync>;

#[async_trait]
pub trait PhotoExtractor: Send + Sync {
    /// Read metadata from the file at `path`, whose detected type is
    /// `mime_type`. Returns `Ok(None)` for files it does not understand.
    async fn extract(&self, path: &Path, mime_type: &str) -> Result<Option<PhotoMetadata>>;
}

/// Never finds anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoExtractor;

#[async_trait]
impl PhotoExtractor for NoExtractor {
    async fn extract(&self, _path: &Path, _mime_type: &str) -> Result<Option<PhotoMetadata>> {
        Ok(None)
    }
}
