//! The metadata store interface.

use crate::error::{ErrorKind, Result};
use crate::models::{FileRecord, FolderRecord};
use async_trait::async_trait;
use hoard_compress::Compression;
use hoard_storage::ContentHash;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub type StoreHandle = Arc<dyn MetadataStore + Send + Sync>;

/// Persistence for folders and file records.
///
/// Lookups return `Ok(None)` when nothing matches; operations that act on an
/// existing entity return [`FolderNotFound`](ErrorKind::FolderNotFound) or
/// [`FileNotFound`](ErrorKind::FileNotFound) instead.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_folder(&self, id: Uuid) -> Result<Option<FolderRecord>>;

    async fn get_folder_by_path(&self, path: &str) -> Result<Option<FolderRecord>>;

    /// Create a folder called `name` beneath `parent` (or at the top level).
    ///
    /// Returns [`InvalidName`](ErrorKind::InvalidName) for names that cannot
    /// be a directory name and [`FolderExists`](ErrorKind::FolderExists) if
    /// the resulting path is taken.
    async fn add_folder(&self, name: &str, parent: Option<Uuid>) -> Result<FolderRecord>;

    /// Rename and/or move a folder, rewriting the paths of every folder
    /// beneath it.
    ///
    /// Returns [`Cycle`](ErrorKind::Cycle) if `parent` is the folder itself
    /// or one of its descendants.
    async fn update_folder(&self, id: Uuid, name: &str, parent: Option<Uuid>) -> Result<FolderRecord>;

    /// Direct children of `parent` (top-level folders for `None`), by name.
    async fn list_folders_by_parent(&self, parent: Option<Uuid>) -> Result<Vec<FolderRecord>>;

    /// Whether `ancestor` is `folder` itself or one of its ancestors.
    async fn is_descendant(&self, folder: Uuid, ancestor: Uuid) -> Result<bool>;

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>>;

    async fn get_file_by_hash(&self, hash: &ContentHash) -> Result<Option<FileRecord>>;

    /// Insert a file record.
    ///
    /// Returns [`DuplicateHash`](ErrorKind::DuplicateHash) if a record with
    /// the same content hash already exists.
    async fn add_file(&self, file: &FileRecord) -> Result<()>;

    /// Point a record at a new stored path (after a move or recompression).
    async fn update_file_path(&self, id: Uuid, path: &Path, compression: Compression) -> Result<()>;

    /// Files directly inside `folder` (files without a folder for `None`).
    async fn list_files_by_folder(&self, folder: Option<Uuid>) -> Result<Vec<FileRecord>>;

    /// Delete a file record, returning whether it existed.
    async fn delete_file(&self, id: Uuid) -> Result<bool>;

    /// Find the folder at a slash-separated `path`, creating it and any
    /// missing ancestors.
    ///
    /// Safe against concurrent callers: losing a creation race falls back
    /// to the folder the winner created.
    async fn get_or_create_folder_by_path(&self, path: &str) -> Result<FolderRecord> {
        let mut parent: Option<FolderRecord> = None;
        let mut current = String::new();
        for name in path.split('/').filter(|name| !name.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(name);
            let folder = match self.get_folder_by_path(&current).await? {
                Some(folder) => folder,
                None => match self.add_folder(name, parent.as_ref().map(|p| p.id)).await {
                    Ok(folder) => {
                        debug!(path = %folder.path, id = %folder.id, "created folder");
                        folder
                    },
                    Err(err) if matches!(&*err, ErrorKind::FolderExists(_)) => self
                        .get_folder_by_path(&current)
                        .await?
                        .ok_or_else(|| err.raise(ErrorKind::Database))?,
                    Err(err) => return Err(err),
                },
            };
            parent = Some(folder);
        }
        match parent {
            Some(folder) => Ok(folder),
            None => exn::bail!(ErrorKind::InvalidName(path.to_string())),
        }
    }
}
