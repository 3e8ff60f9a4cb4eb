//! Finding and deleting stored files.

use crate::Library;
use crate::error::{ErrorKind, Result, from_storage};
use exn::{OptionExt, ResultExt};
use hoard_cache::MetadataStore;
use hoard_storage::error::ErrorKind as StorageErrorKind;
use hoard_storage::{Deleted, PathResolver, Resolution, StorageWriter};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use uuid::Uuid;

impl Library {
    /// Find the physical file behind a stored path, tolerating a moved
    /// storage root or a file that has since been compressed.
    ///
    /// Never fails: a missing file is [`Resolution::NotFound`], carrying the
    /// candidates that were checked.
    pub async fn resolve_physical_path(&self, stored: &Path, is_compressed: bool) -> Resolution {
        self.resolver.resolve(stored, is_compressed).await
    }

    /// Delete a physical file (absolute, or relative to the storage root),
    /// into the recycle bin unless `move_to_recycle_bin` is false.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if there is no such file;
    /// whether that matters is up to the caller.
    pub async fn delete_physical_file(&self, path: &Path, move_to_recycle_bin: bool) -> Result<Deleted> {
        self.writer.delete(path, move_to_recycle_bin).await.map_err(from_storage)
    }

    /// Move a recycled file back to where it was deleted from.
    pub async fn restore_physical_file(&self, recycled: &Path) -> Result<PathBuf> {
        self.writer.restore(recycled).await.map_err(from_storage)
    }

    /// Delete a file record together with its physical file.
    ///
    /// A record whose file can no longer be found is still removed; the
    /// return value is `None` in that case.
    #[instrument(skip(self))]
    pub async fn delete_file(&self, id: Uuid, move_to_recycle_bin: bool) -> Result<Option<Deleted>> {
        let record = self.store.get_file(id).await.or_raise(|| ErrorKind::Cache)?.ok_or_raise(|| ErrorKind::FileNotFound(id))?;
        let deleted = match self.resolve_physical_path(&record.path, record.compression.is_compressed()).await {
            Resolution::Found { path, .. } => match self.writer.delete(&path, move_to_recycle_bin).await {
                Ok(deleted) => Some(deleted),
                Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
                    warn!(path = %path.display(), "file vanished before it could be deleted");
                    None
                },
                Err(err) => return Err(from_storage(err)),
            },
            Resolution::NotFound { .. } => {
                warn!(path = %record.path.display(), "no physical file for record; removing the record only");
                None
            },
        };
        self.store.delete_file(id).await.or_raise(|| ErrorKind::Cache)?;
        info!(path = %record.path.display(), "deleted file");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::{Context, Library};
    use hoard_cache::{MemoryStore, MetadataStore};
    use hoard_compress::Compression;
    use hoard_config::DEFAULT_DATE_TEMPLATE;
    use hoard_storage::{Deleted, LocalResolver, LocalWriter, MockStorage, ORIGIN_FILE, Resolution, Step};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::fs;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    struct Fixture {
        dir: TempDir,
        root: PathBuf,
        store: Arc<MemoryStore>,
        library: Library,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("storage");
        let store = Arc::new(MemoryStore::new());
        let writer = Arc::new(LocalWriter::new(&root, dir.path().join("recycle")).unwrap());
        let resolver = Arc::new(LocalResolver::new(&root, Compression::Gzip).with_working_dir(dir.path()));
        let library = Library::new(store.clone(), writer, resolver, Context::new(DEFAULT_DATE_TEMPLATE).unwrap());
        Fixture { dir, root, store, library }
    }

    async fn touch(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(path, content).await.unwrap();
    }

    #[tokio::test]
    async fn test_resolve_relative_path_to_compressed_variant() {
        let fx = fixture().await;
        touch(&fx.root.join("relative/old.txt.gz"), &Compression::Gzip.compress(b"old").unwrap()).await;
        let resolution = fx.library.resolve_physical_path(Path::new("relative/old.txt"), false).await;
        match resolution {
            Resolution::Found { path, compression, step, .. } => {
                assert_eq!(path, fx.root.join("relative/old.txt.gz"));
                assert_eq!(compression, Compression::Gzip);
                assert_eq!(step, Step::StorageRootCompressed);
            },
            other => panic!("expected a hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_prefers_uncompressed() {
        let fx = fixture().await;
        touch(&fx.root.join("Default/a.txt"), b"plain").await;
        touch(&fx.root.join("Default/a.txt.gz"), b"gz").await;
        let resolution = fx.library.resolve_physical_path(&fx.root.join("Default/a.txt"), false).await;
        assert_eq!(resolution.path(), Some(fx.root.join("Default/a.txt").as_path()));
    }

    #[tokio::test]
    async fn test_resolve_absolute_miss() {
        let fx = fixture().await;
        touch(&fx.root.join("Default/neighbour.txt"), b"hi").await;
        let resolution = fx.library.resolve_physical_path(&fx.root.join("Default/gone.txt"), false).await;
        match resolution {
            Resolution::NotFound { siblings, checked } => {
                assert_eq!(siblings, vec!["neighbour.txt".to_string()]);
                assert_eq!(checked.len(), 2);
            },
            other => panic!("expected a miss, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_into_recycle_bin() {
        let fx = fixture().await;
        let file = fx.root.join("Default/photo.jpg");
        touch(&file, b"jpeg").await;
        let deleted = fx.library.delete_physical_file(Path::new("Default/photo.jpg"), true).await.unwrap();
        let Deleted::Recycled { from, to } = deleted else { panic!("expected a recycled file") };
        assert_eq!(from, file);
        assert!(!file.exists());
        assert!(to.starts_with(fx.dir.path().join("recycle")));
        assert_eq!(fs::read(&to).await.unwrap(), b"jpeg");
        assert!(to.with_file_name(ORIGIN_FILE).exists());

        let restored = fx.library.restore_physical_file(&to).await.unwrap();
        assert_eq!(restored, file);
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_delete_missing_physical_file() {
        let fx = fixture().await;
        let err = fx.library.delete_physical_file(Path::new("Default/ghost.jpg"), true).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_file_removes_record_and_file() {
        let fx = fixture().await;
        let source = fx.dir.path().join("notes.txt");
        touch(&source, b"words").await;
        let uploaded = fx.library.upload(&source, None, false, &CancellationToken::new()).await.unwrap();

        let deleted = fx.library.delete_file(uploaded.file_id, false).await.unwrap();
        assert_eq!(deleted, Some(Deleted::Erased(fx.root.join("Default/notes.txt"))));
        assert_eq!(fx.store.get_file(uploaded.file_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_orphaned_record() {
        let fx = fixture().await;
        let source = fx.dir.path().join("notes.txt");
        touch(&source, b"words").await;
        let uploaded = fx.library.upload(&source, None, false, &CancellationToken::new()).await.unwrap();
        fs::remove_file(fx.root.join(&uploaded.final_path)).await.unwrap();

        assert_eq!(fx.library.delete_file(uploaded.file_id, true).await.unwrap(), None);
        assert_eq!(fx.store.file_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_record() {
        let fx = fixture().await;
        let id = Uuid::new_v4();
        let err = fx.library.delete_file(id, true).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::FileNotFound(missing) if *missing == id));
    }

    #[tokio::test]
    async fn test_against_in_memory_storage() {
        let storage = Arc::new(MockStorage::with_files([("Default/a.txt.gz", b"gz".to_vec())]));
        let library = Library::new(
            Arc::new(MemoryStore::new()),
            storage.clone(),
            storage.clone(),
            Context::new(DEFAULT_DATE_TEMPLATE).unwrap(),
        );
        let resolution = library.resolve_physical_path(Path::new("Default/a.txt"), true).await;
        assert_eq!(resolution.path(), Some(Path::new("/mock/Default/a.txt.gz")));
        library.delete_physical_file(Path::new("Default/a.txt.gz"), false).await.unwrap();
        assert_eq!(storage.paths().await, Vec::<PathBuf>::new());
    }
}
