//! The upload pipeline: validate, hash, deduplicate, stage, record.

use crate::Library;
use crate::error::{ErrorKind, Result, from_storage};
use crate::mime::detect_mime_type;
use crate::{DedupResolver, PhotoExtractor};
use exn::{OptionExt, ResultExt};
use hoard_cache::error::ErrorKind as CacheErrorKind;
use hoard_cache::{FileRecord, FolderRecord, MetadataStore, PhotoMetadata};
use hoard_storage::{ContentHash, Hasher, StorageWriter, to_stored};
use std::collections::BTreeSet;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// What an upload ended up as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadResult {
    pub file_id: Uuid,
    /// The content was already stored; `file_id` and `final_path` belong to
    /// the existing record and nothing new was written.
    pub is_duplicate: bool,
    /// Stored path of the file: relative to the storage root when it lives
    /// under it.
    pub final_path: PathBuf,
    pub hash: ContentHash,
}
impl UploadResult {
    fn duplicate(existing: &FileRecord) -> Self {
        Self { file_id: existing.id, is_duplicate: true, final_path: existing.path.clone(), hash: existing.hash }
    }
}

impl Library {
    /// Store `source` in the hoard, unless identical content is already
    /// there.
    ///
    /// The file goes into the folder `destination` (falling back to the
    /// default folder when that is missing or cannot be looked up), inside a
    /// dated subdirectory when `organize_by_date` is set. The date is the
    /// photo's date taken when the extractor finds one, otherwise now.
    ///
    /// # Errors
    /// - [`NotFound`](ErrorKind::NotFound) if `source` does not exist.
    /// - [`Validation`](ErrorKind::Validation) if it is not a regular file,
    ///   has no file name, or is larger than the configured maximum.
    /// - [`Cancelled`](ErrorKind::Cancelled) if `cancel` fires before the
    ///   file is published. Nothing is left behind.
    /// - [`SourceChanged`](ErrorKind::SourceChanged) if the bytes staged do
    ///   not hash to what was deduplicated against. Nothing is left behind.
    /// - [`Storage`](ErrorKind::Storage) or [`Cache`](ErrorKind::Cache) when a
    ///   collaborator fails.
    #[instrument(skip_all, fields(source = %source.display(), organize_by_date))]
    pub async fn upload(
        &self,
        source: &Path,
        destination: Option<Uuid>,
        organize_by_date: bool,
        cancel: &CancellationToken,
    ) -> Result<UploadResult> {
        let name = self.validate_source(source).await?;
        let folder = self.destination_folder(destination).await?;
        let hash = self.hasher.hash_file(source, cancel).await.map_err(from_storage)?;

        let _guard = self.locks.lock(hash).await;
        if let Some(existing) = self.dedup.resolve(&hash).await? {
            info!(%hash, file = %existing.id, "content already stored");
            return Ok(UploadResult::duplicate(&existing));
        }

        // The date taken decides the directory, so extraction runs on the
        // source before anything is staged.
        let mime_type = detect_mime_type(source).await;
        let photo = self.extract_photo(source, &mime_type).await;
        let mut directory = PathBuf::from(&folder.path);
        if organize_by_date {
            let date = photo.as_ref().and_then(|p| p.taken_at).unwrap_or_else(UtcDateTime::now);
            directory.push(self.ctx.template.generate(date)?);
        }

        let staged = self
            .writer
            .save(source, &directory, self.ctx.compression, self.hasher.as_ref(), cancel)
            .await
            .map_err(from_storage)?;
        if cancel.is_cancelled() {
            if let Err(err) = self.writer.discard(staged).await {
                warn!(error = ?err, "could not remove staged file after cancellation");
            }
            exn::bail!(ErrorKind::Cancelled);
        }
        // The bytes that were staged must be the bytes that were deduplicated.
        if staged.hash() != hash {
            warn!(%hash, staged = %staged.hash(), "source changed after it was hashed");
            if let Err(err) = self.writer.discard(staged).await {
                warn!(error = ?err, "could not remove staged file of a changed source");
            }
            exn::bail!(ErrorKind::SourceChanged(source.to_path_buf()));
        }
        let size = staged.size();
        let compression = staged.compression();
        let physical = self.writer.commit(staged).await.map_err(from_storage)?;

        let record = FileRecord {
            id: Uuid::new_v4(),
            path: to_stored(self.writer.root(), &physical),
            name,
            hash,
            size,
            compression,
            mime_type,
            folder_id: Some(folder.id),
            created_at: UtcDateTime::now(),
            photo,
            tags: BTreeSet::new(),
        };
        match self.store.add_file(&record).await {
            Ok(()) => {
                info!(%hash, file = %record.id, path = %record.path.display(), "stored new file");
                Ok(UploadResult { file_id: record.id, is_duplicate: false, final_path: record.path, hash })
            },
            Err(err) if matches!(&*err, CacheErrorKind::DuplicateHash(_)) => {
                // Another process recorded the same content first.
                self.remove_committed(&physical).await;
                let winner = self
                    .store
                    .get_file_by_hash(&hash)
                    .await
                    .or_raise(|| ErrorKind::Cache)?
                    .ok_or_else(|| err.raise(ErrorKind::Cache))?;
                info!(%hash, file = %winner.id, "content recorded concurrently elsewhere");
                Ok(UploadResult::duplicate(&winner))
            },
            Err(err) => {
                self.remove_committed(&physical).await;
                Err(err).or_raise(|| ErrorKind::Cache)
            },
        }
    }

    /// Check the source before anything is touched, returning its file name.
    async fn validate_source(&self, source: &Path) -> Result<String> {
        let metadata = match fs::metadata(source).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == IoErrorKind::NotFound => exn::bail!(ErrorKind::NotFound(source.to_path_buf())),
            Err(err) => return Err(err).or_raise(|| ErrorKind::Storage),
        };
        if !metadata.is_file() {
            exn::bail!(ErrorKind::Validation(format!("{} is not a regular file", source.display())));
        }
        if metadata.len() > self.ctx.max_upload_size {
            exn::bail!(ErrorKind::Validation(format!(
                "{} is {} bytes, larger than the {} byte limit",
                source.display(),
                metadata.len(),
                self.ctx.max_upload_size
            )));
        }
        source
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_raise(|| ErrorKind::Validation(format!("{} has no usable file name", source.display())))
    }

    /// The requested folder if it exists, otherwise the default folder
    /// (created on demand). Either way its directory exists afterwards.
    async fn destination_folder(&self, requested: Option<Uuid>) -> Result<FolderRecord> {
        let found = match requested {
            Some(id) => match self.store.get_folder(id).await {
                Ok(Some(folder)) => Some(folder),
                Ok(None) => {
                    warn!(folder = %id, "destination folder does not exist; using the default folder");
                    None
                },
                Err(err) => {
                    warn!(folder = %id, error = ?err, "could not look up destination folder; using the default folder");
                    None
                },
            },
            None => None,
        };
        let folder = match found {
            Some(folder) => folder,
            None => self
                .store
                .get_or_create_folder_by_path(&self.ctx.default_folder)
                .await
                .or_raise(|| ErrorKind::Cache)?,
        };
        self.writer.create_dir(Path::new(&folder.path)).await.map_err(from_storage)?;
        Ok(folder)
    }

    async fn extract_photo(&self, source: &Path, mime_type: &str) -> Option<PhotoMetadata> {
        match self.extractor.extract(source, mime_type).await {
            Ok(photo) => photo.filter(|p| !p.is_empty()),
            Err(err) => {
                warn!(error = ?err, "photo metadata extraction failed; continuing without it");
                None
            },
        }
    }

    /// Undo a commit whose record could not be inserted.
    async fn remove_committed(&self, physical: &Path) {
        match self.writer.delete(physical, false).await {
            Ok(_) => debug!(path = %physical.display(), "removed unrecorded file"),
            Err(err) => warn!(path = %physical.display(), error = ?err, "could not remove unrecorded file"),
        }
    }
}
