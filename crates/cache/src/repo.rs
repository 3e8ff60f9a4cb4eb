//! SQLite-backed [`MetadataStore`].

use crate::Database;
use crate::error::{ErrorKind, Result, is_unique_violation};
use crate::models::{FileRecord, FileRow, FolderRecord, FolderRow, child_path, validate_folder_name};
use crate::store::MetadataStore;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use hoard_compress::Compression;
use hoard_storage::ContentHash;
use sqlx::{SqliteExecutor, SqlitePool};
use std::path::Path;
use time::UtcDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Repository for folders and file records in the metadata database.
///
/// # Invariants enforced by the schema
///
/// - Folder paths are unique, so sibling names are too.
/// - Content hashes are unique across file records; a second insert of the
///   same content fails with [`DuplicateHash`](ErrorKind::DuplicateHash),
///   which is how concurrent uploads from separate processes are settled.
/// - A folder cannot be deleted while it has children; deleting a folder
///   detaches its files rather than deleting them.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn sqlx_hates_paths(path: &Path) -> Result<&str> {
        path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))
    }

    async fn require_folder(&self, id: Uuid) -> Result<FolderRecord> {
        self.get_folder(id).await?.ok_or_raise(|| ErrorKind::FolderNotFound(id))
    }
}

async fn fetch_folder(conn: impl SqliteExecutor<'_>, id: Uuid) -> Result<Option<FolderRecord>> {
    let row: Option<FolderRow> = sqlx::query_as(include_str!("../queries/get_folder.sql"))
        .bind(id.to_string())
        .fetch_optional(conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(FolderRecord::try_from).transpose()
}

async fn descends_from(conn: impl SqliteExecutor<'_>, folder: Uuid, ancestor: Uuid) -> Result<bool> {
    sqlx::query_scalar(include_str!("../queries/is_descendant.sql"))
        .bind(folder.to_string())
        .bind(ancestor.to_string())
        .fetch_one(conn)
        .await
        .or_raise(|| ErrorKind::Database)
}

#[async_trait]
impl MetadataStore for Repository {
    // =========================================================================
    // Folders
    // =========================================================================

    async fn get_folder(&self, id: Uuid) -> Result<Option<FolderRecord>> {
        fetch_folder(&self.pool, id).await
    }

    async fn get_folder_by_path(&self, path: &str) -> Result<Option<FolderRecord>> {
        let row: Option<FolderRow> = sqlx::query_as(include_str!("../queries/get_folder_by_path.sql"))
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FolderRecord::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn add_folder(&self, name: &str, parent: Option<Uuid>) -> Result<FolderRecord> {
        validate_folder_name(name)?;
        let parent = match parent {
            Some(id) => Some(self.require_folder(id).await?),
            None => None,
        };
        let folder = FolderRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            path: child_path(parent.as_ref(), name),
            parent_id: parent.map(|p| p.id),
            created_at: UtcDateTime::now(),
        };
        let row = FolderRow::try_from(&folder)?;
        let result = sqlx::query(include_str!("../queries/insert_folder.sql"))
            .bind(row.id)
            .bind(row.name)
            .bind(row.path)
            .bind(row.parent_id)
            .bind(row.created_at)
            .execute(&self.pool)
            .await;
        match result {
            Err(err) if is_unique_violation(&err) => Err(err).or_raise(|| ErrorKind::FolderExists(folder.path.clone())),
            other => other.map(|_| folder).or_raise(|| ErrorKind::Database),
        }
    }

    #[instrument(skip(self))]
    async fn update_folder(&self, id: Uuid, name: &str, parent: Option<Uuid>) -> Result<FolderRecord> {
        validate_folder_name(name)?;
        // Take the write lock before reading, so that two moves cannot both
        // pass the cycle check against the same snapshot.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await.or_raise(|| ErrorKind::Database)?;
        let folder = fetch_folder(&mut *tx, id).await?.ok_or_raise(|| ErrorKind::FolderNotFound(id))?;
        let parent = match parent {
            Some(parent_id) => {
                if descends_from(&mut *tx, parent_id, id).await? {
                    exn::bail!(ErrorKind::Cycle);
                }
                let parent = fetch_folder(&mut *tx, parent_id).await?;
                Some(parent.ok_or_raise(|| ErrorKind::FolderNotFound(parent_id))?)
            },
            None => None,
        };
        let updated = FolderRecord {
            name: name.to_string(),
            path: child_path(parent.as_ref(), name),
            parent_id: parent.map(|p| p.id),
            ..folder.clone()
        };
        if updated == folder {
            return Ok(updated);
        }

        // SQLite's substr() and length() count characters, not bytes.
        let old_prefix_length = i64::try_from(folder.path.chars().count() + 1)
            .or_raise(|| ErrorKind::InvalidData("folder path"))?;
        let result = sqlx::query(include_str!("../queries/update_folder.sql"))
            .bind(&updated.name)
            .bind(&updated.path)
            .bind(updated.parent_id.map(|id| id.to_string()))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await;
        if let Err(err) = result {
            return match is_unique_violation(&err) {
                true => Err(err).or_raise(|| ErrorKind::FolderExists(updated.path.clone())),
                false => Err(err).or_raise(|| ErrorKind::Database),
            };
        }
        let moved = sqlx::query(include_str!("../queries/rewrite_descendant_paths.sql"))
            .bind(&updated.path)
            .bind(old_prefix_length)
            .bind(old_prefix_length)
            .bind(format!("{}/", folder.path))
            .execute(&mut *tx)
            .await;
        let moved = match moved {
            Err(err) if is_unique_violation(&err) => {
                return Err(err).or_raise(|| ErrorKind::FolderExists(updated.path.clone()));
            },
            other => other.or_raise(|| ErrorKind::Database)?,
        };
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        debug!(from = %folder.path, to = %updated.path, descendants = moved.rows_affected(), "moved folder");
        Ok(updated)
    }

    async fn list_folders_by_parent(&self, parent: Option<Uuid>) -> Result<Vec<FolderRecord>> {
        let rows: Vec<FolderRow> = sqlx::query_as(include_str!("../queries/list_folders_by_parent.sql"))
            .bind(parent.map(|id| id.to_string()))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(FolderRecord::try_from).collect()
    }

    async fn is_descendant(&self, folder: Uuid, ancestor: Uuid) -> Result<bool> {
        descends_from(&self.pool, folder, ancestor).await
    }

    // =========================================================================
    // Files
    // =========================================================================

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file.sql"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    async fn get_file_by_hash(&self, hash: &ContentHash) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file_by_hash.sql"))
            .bind(hash.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    #[instrument(skip_all, fields(id = %file.id, hash = %file.hash))]
    async fn add_file(&self, file: &FileRecord) -> Result<()> {
        let row = FileRow::try_from(file)?;
        let result = sqlx::query(include_str!("../queries/insert_file.sql"))
            .bind(row.id)
            .bind(row.path)
            .bind(row.name)
            .bind(row.hash)
            .bind(row.size)
            .bind(row.compression)
            .bind(row.mime_type)
            .bind(row.folder_id)
            .bind(row.created_at)
            .bind(row.taken_at)
            .bind(row.camera_make)
            .bind(row.camera_model)
            .bind(row.latitude)
            .bind(row.longitude)
            .bind(row.tags)
            .execute(&self.pool)
            .await;
        match result {
            Err(err) if is_unique_violation(&err) => Err(err).or_raise(|| ErrorKind::DuplicateHash(file.hash.to_string())),
            other => other.map(|_| ()).or_raise(|| ErrorKind::Database),
        }
    }

    async fn update_file_path(&self, id: Uuid, path: &Path, compression: Compression) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/update_file_path.sql"))
            .bind(Self::sqlx_hates_paths(path)?)
            .bind(compression.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match result.rows_affected() {
            0 => exn::bail!(ErrorKind::FileNotFound(id)),
            _ => Ok(()),
        }
    }

    async fn list_files_by_folder(&self, folder: Option<Uuid>) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_files_by_folder.sql"))
            .bind(folder.map(|id| id.to_string()))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(FileRecord::try_from).collect()
    }

    async fn delete_file(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_file.sql"))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
