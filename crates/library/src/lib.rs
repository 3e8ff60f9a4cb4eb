//! Uploading, deduplicating and finding files in the hoard.
//!
//! [`Library`] ties the collaborators together:
//!
//! - a [`MetadataStore`](hoard_cache::MetadataStore) for folder and file
//!   records,
//! - a [`Hasher`](hoard_storage::Hasher) and a [`DedupResolver`] to spot
//!   content that is already stored,
//! - a [`StorageWriter`](hoard_storage::StorageWriter) to persist new files
//!   and delete old ones,
//! - a [`PathResolver`](hoard_storage::PathResolver) to find files whose
//!   recorded path has drifted,
//! - an optional [`PhotoExtractor`].
//!
//! Each is passed in as an `Arc<dyn Trait>` handle so tests can swap in the
//! in-memory doubles from the `mock` features of the storage and cache
//! crates.

mod dedup;
pub mod error;
mod files;
mod mime;
mod photo;
mod stream;
mod template;
mod upload;

pub use crate::dedup::{DedupHandle, DedupResolver, HashLocks, StoreDedup};
pub use crate::mime::{FALLBACK_MIME_TYPE, detect_mime_type};
pub use crate::photo::{ExtractorHandle, NoExtractor, PhotoExtractor};
pub use crate::stream::{UploadEvent, upload_all};
pub use crate::template::PathGenerator;
pub use crate::upload::UploadResult;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use hoard_cache::{MetadataStore, StoreHandle};
use hoard_compress::Compression;
use hoard_config::{Config, DEFAULT_FOLDER, DEFAULT_MAX_UPLOAD_SIZE};
use hoard_storage::{Blake3Hasher, HasherHandle, ResolverHandle, StorageWriter, WriterHandle};
use std::path::Path;
use std::sync::Arc;

/// How many files [`upload_all`] works on at once.
pub const MAX_UPLOAD_CONCURRENCY: usize = 8;

/// Settings for uploads.
#[derive(Debug)]
pub struct Context {
    /// Folder path used when an upload names no (existing) destination.
    pub default_folder: String,
    /// Subdirectory layout for uploads organized by date.
    pub template: PathGenerator,
    /// Compression applied to newly stored files.
    pub compression: Compression,
    /// Largest accepted upload, in bytes.
    pub max_upload_size: u64,
}
impl Context {
    /// Defaults for everything but the date template.
    ///
    /// ```
    /// use hoard_library::Context;
    ///
    /// let ctx = Context::new("{{ year }}").unwrap();
    /// assert_eq!(ctx.default_folder, "Default");
    /// assert!(Context::new("{{ year").is_err());
    /// ```
    pub fn new(template: &str) -> Result<Self> {
        Ok(Self {
            default_folder: DEFAULT_FOLDER.to_string(),
            template: template.parse()?,
            compression: Compression::None,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            default_folder: config.library.default_folder.clone(),
            template: config.library.date_template.parse()?,
            compression: config.storage.upload_compression(),
            max_upload_size: config.library.max_upload_size,
        })
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

/// The public face of the hoard: upload, resolve and delete.
pub struct Library {
    store: StoreHandle,
    hasher: HasherHandle,
    dedup: DedupHandle,
    writer: WriterHandle,
    resolver: ResolverHandle,
    extractor: ExtractorHandle,
    locks: HashLocks,
    ctx: Context,
}

impl Library {
    /// A library hashing with BLAKE3, deduplicating against `store`, and
    /// without photo metadata extraction.
    pub fn new(store: StoreHandle, writer: WriterHandle, resolver: ResolverHandle, ctx: Context) -> Self {
        Self {
            dedup: Arc::new(StoreDedup::new(store.clone())),
            store,
            hasher: Arc::new(Blake3Hasher),
            writer,
            resolver,
            extractor: Arc::new(NoExtractor),
            locks: HashLocks::default(),
            ctx,
        }
    }

    pub fn with_hasher(mut self, hasher: HasherHandle) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupHandle) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorHandle) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn hasher(&self) -> &HasherHandle {
        &self.hasher
    }

    /// Ensure the default folder exists, record and directory both.
    pub async fn init(&self) -> Result<()> {
        let folder =
            self.store.get_or_create_folder_by_path(&self.ctx.default_folder).await.or_raise(|| ErrorKind::Cache)?;
        self.writer.create_dir(Path::new(&folder.path)).await.map_err(error::from_storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_cache::MemoryStore;
    use hoard_storage::MockStorage;

    #[test]
    fn test_default_context() {
        let ctx = Context::new(hoard_config::DEFAULT_DATE_TEMPLATE).unwrap();
        assert_eq!(ctx.default_folder, "Default");
        assert_eq!(ctx.compression, Compression::None);
    }

    #[test]
    fn test_context_from_config() {
        let mut config = Config::default();
        config.storage.compress = true;
        config.storage.compression = Compression::Bzip2;
        config.library.default_folder = "Inbox".to_string();
        let ctx = Context::from_config(&config).unwrap();
        assert_eq!(ctx.default_folder, "Inbox");
        assert_eq!(ctx.compression, Compression::Bzip2);
    }

    #[tokio::test]
    async fn test_init_creates_default_folder() {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MockStorage::default());
        let library = Library::new(store.clone(), storage.clone(), storage, Context::new(hoard_config::DEFAULT_DATE_TEMPLATE).unwrap());
        library.init().await.unwrap();
        library.init().await.unwrap();
        let top = store.list_folders_by_parent(None).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].path, "Default");
    }
}
