//! Staged writes into the storage root, and deletion.
//!
//! A save never exposes a partially written file: content is streamed into a
//! hidden temporary file next to its destination, fsynced, and only then
//! linked into place under a name that is guaranteed to be free.
//! Deletion either erases a file or moves it into the recycle bin.

use crate::error::{ErrorKind, Result};
use crate::hash::{CHUNK_SIZE, ContentHash, Hasher};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use exn::OptionExt;
use futures::io::AsyncWriteExt;
use hoard_compress::Compression;
use std::ffi::OsString;
use std::fs::create_dir_all as sync_create_dir;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncReadExt;
use tokio_util::compat::TokioAsyncWriteCompatExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Name of the sidecar file recording where a recycled file came from.
pub const ORIGIN_FILE: &str = "origin.txt";
/// How many numbered alternatives (`name (1).ext`, …) are tried before
/// giving up on finding a free name.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// A fully written, not yet visible file.
///
/// Hand it back to [`StorageWriter::commit`] to publish it, or to
/// [`StorageWriter::discard`] to throw it away.
#[derive(Debug)]
#[must_use = "a staged file must be committed or discarded"]
pub struct StagedFile {
    pub(crate) temp: PathBuf,
    pub(crate) target: PathBuf,
    pub(crate) size: u64,
    pub(crate) written: u64,
    pub(crate) compression: Compression,
    pub(crate) hash: ContentHash,
}
impl StagedFile {
    /// Where the content currently lives.
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// The name the file will be published under, if that name is free.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Size of the original (uncompressed) content.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes actually written to disk.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Hash of the original bytes as they were read while staging.
    pub fn hash(&self) -> ContentHash {
        self.hash
    }
}

/// The outcome of deleting a physical file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Deleted {
    /// Moved into the recycle bin.
    Recycled { from: PathBuf, to: PathBuf },
    /// Removed permanently.
    Erased(PathBuf),
}
impl Deleted {
    /// Where the file was before deletion.
    pub fn original(&self) -> &Path {
        match self {
            Deleted::Recycled { from, .. } => from,
            Deleted::Erased(path) => path,
        }
    }
}

/// Persists files under a storage root.
#[async_trait]
pub trait StorageWriter: Send + Sync {
    /// Absolute path of the storage root.
    fn root(&self) -> &Path;

    /// Create a directory (relative to the root) and any missing parents,
    /// returning its physical path.
    async fn create_dir(&self, relative: &Path) -> Result<PathBuf>;

    /// Stream `source` into a temporary file inside `destination` (relative
    /// to the root), compressing it when `compression` is not
    /// [`None`](Compression::None).
    ///
    /// The bytes read are hashed with `hasher` on the way through; see
    /// [`StagedFile::hash`]. Missing directories are created. On error or
    /// cancellation the temporary file is removed before returning.
    async fn save(
        &self,
        source: &Path,
        destination: &Path,
        compression: Compression,
        hasher: &dyn Hasher,
        cancel: &CancellationToken,
    ) -> Result<StagedFile>;

    /// Atomically publish a staged file, returning its final physical path.
    ///
    /// Existing files are never overwritten: if the target name is taken the
    /// first free `name (n).ext` is used instead.
    async fn commit(&self, staged: StagedFile) -> Result<PathBuf>;

    /// Remove a staged file without publishing it.
    async fn discard(&self, staged: StagedFile) -> Result<()>;

    /// Delete a physical file (absolute, or relative to the root).
    ///
    /// With `move_to_recycle_bin` the file is moved to
    /// `<recycle>/<unix seconds>-<uuid>/<original name>` next to an
    /// [`ORIGIN_FILE`] recording where it came from. Returns
    /// [`NotFound`](ErrorKind::NotFound) if there is no such file.
    async fn delete(&self, path: &Path, move_to_recycle_bin: bool) -> Result<Deleted>;

    /// Move a recycled file back to where it was deleted from, returning the
    /// path it was restored to (numbered if the original name is now taken).
    async fn restore(&self, recycled: &Path) -> Result<PathBuf>;
}

/// Name for the temporary file that stages `name`.
pub(crate) fn temp_name(name: &std::ffi::OsStr) -> OsString {
    let mut temp = OsString::from(".");
    temp.push(name);
    temp.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    temp
}

/// `name.ext` → `name (n).ext`, numbering before the first extension so
/// that `photo.jpg.gz` becomes `photo (1).jpg.gz`.
pub(crate) fn numbered(target: &Path, n: usize) -> PathBuf {
    let name = target.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
    // A leading dot belongs to the stem (dotfiles have no extension).
    let split = name.char_indices().skip(1).find(|(_, c)| *c == '.').map_or(name.len(), |(i, _)| i);
    let (stem, extension) = name.split_at(split);
    target.with_file_name(format!("{stem} ({n}){extension}"))
}

/// Local filesystem storage writer.
///
/// # Examples
///
/// ```no_run
/// use hoard_storage::LocalWriter;
///
/// # fn example() -> hoard_storage::error::Result<()> {
/// let writer = LocalWriter::new("/srv/hoard", "/srv/hoard/.recycle")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalWriter {
    root: PathBuf,
    recycle_bin: PathBuf,
}

impl LocalWriter {
    /// Create a writer for an absolute storage root, creating the root if it
    /// does not exist yet.
    ///
    /// The recycle bin directory is created lazily on first use.
    pub fn new(root: impl AsRef<Path>, recycle_bin: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let recycle_bin = recycle_bin.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if !recycle_bin.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(recycle_bin));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
        }
        Ok(Self { root, recycle_bin })
    }

    pub fn recycle_bin(&self) -> &Path {
        &self.recycle_bin
    }

    fn physical(&self, path: &Path) -> Result<PathBuf> {
        match path.is_absolute() {
            true => Ok(path.to_path_buf()),
            false => Ok(self.root.join(validate_path(path)?)),
        }
    }

    /// Copy `source` into `temp`, returning the original size, the bytes
    /// written and the hash of what was read.
    async fn stream_into(
        source: &Path,
        temp: &Path,
        compression: Compression,
        hasher: &dyn Hasher,
        cancel: &CancellationToken,
    ) -> Result<(u64, u64, ContentHash)> {
        let mut input = File::open(source).await.map_err(|e| ErrorKind::from_io(e, source))?;
        let output = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp)
            .await
            .map_err(|e| ErrorKind::from_io(e, temp))?;
        let mut output = output.compat_write();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut size: u64 = 0;
        let mut digest = hasher.digest();
        {
            let mut encoder = compression.async_wrap_writer(&mut output);
            loop {
                if cancel.is_cancelled() {
                    exn::bail!(ErrorKind::Cancelled);
                }
                let read = input.read(&mut buffer).await.map_err(ErrorKind::Io)?;
                if read == 0 {
                    break;
                }
                digest.update(&buffer[..read]);
                encoder.write_all(&buffer[..read]).await.map_err(ErrorKind::Io)?;
                size += read as u64;
            }
            encoder.close().await.map_err(ErrorKind::Io)?;
        }
        let output = output.into_inner();
        output.sync_all().await.map_err(ErrorKind::Io)?;
        let written = output.metadata().await.map_err(ErrorKind::Io)?.len();
        Ok((size, written, digest.finalize()))
    }
}

/// Move a file, copying across filesystems when a rename cannot.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == IoErrorKind::CrossesDevices => {
            debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying instead");
            fs::copy(from, to).await.map_err(|e| ErrorKind::from_io(e, to))?;
            fs::remove_file(from).await.map_err(|e| ErrorKind::from_io(e, from))?;
            Ok(())
        },
        Err(err) => exn::bail!(ErrorKind::from_io(err, from)),
    }
}

/// Move `from` to `target`, or to the first free numbered alternative.
///
/// Hard links fail atomically when the name is taken, so two concurrent
/// publishers can never claim the same name. Filesystems without hard links
/// (FAT, most network and FUSE mounts) fall back to an existence check and
/// rename. Linux reports those with EPERM, so a genuine permission problem
/// only surfaces from the rename.
async fn place_unique(from: &Path, target: &Path) -> Result<PathBuf> {
    place_with(from, target, |original, link| fs::hard_link(original, link)).await
}

async fn place_with<L, F>(from: &Path, target: &Path, link: L) -> Result<PathBuf>
where
    L: Fn(PathBuf, PathBuf) -> F,
    F: Future<Output = std::io::Result<()>>,
{
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = match attempt {
            0 => target.to_path_buf(),
            n => numbered(target, n),
        };
        match link(from.to_path_buf(), candidate.clone()).await {
            Ok(()) => {
                if let Err(err) = fs::remove_file(from).await {
                    warn!(path = %from.display(), error = %err, "published file but could not remove its source");
                }
                return Ok(candidate);
            },
            Err(err) if err.kind() == IoErrorKind::AlreadyExists => continue,
            Err(err)
                if matches!(
                    err.kind(),
                    IoErrorKind::Unsupported | IoErrorKind::CrossesDevices | IoErrorKind::PermissionDenied
                ) =>
            {
                if fs::try_exists(&candidate).await.map_err(ErrorKind::Io)? {
                    continue;
                }
                move_file(from, &candidate).await?;
                return Ok(candidate);
            },
            Err(err) => exn::bail!(ErrorKind::from_io(err, &candidate)),
        }
    }
    exn::bail!(ErrorKind::AlreadyExists(target.to_path_buf()))
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {},
        Err(err) if err.kind() == IoErrorKind::NotFound => {},
        Err(err) => warn!(path = %path.display(), error = %err, "could not remove temporary file"),
    }
}

#[async_trait]
impl StorageWriter for LocalWriter {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn create_dir(&self, relative: &Path) -> Result<PathBuf> {
        let directory = self.root.join(validate_path(relative)?);
        fs::create_dir_all(&directory).await.map_err(|e| ErrorKind::from_io(e, &directory))?;
        Ok(directory)
    }

    #[instrument(skip_all, fields(source = %source.display(), destination = %destination.display(), %compression))]
    async fn save(
        &self,
        source: &Path,
        destination: &Path,
        compression: Compression,
        hasher: &dyn Hasher,
        cancel: &CancellationToken,
    ) -> Result<StagedFile> {
        let name = source.file_name().ok_or_raise(|| ErrorKind::InvalidPath(source.to_path_buf()))?;
        let directory = self.create_dir(destination).await?;
        let target = compression.with_suffix(directory.join(name));
        let temp = directory.join(temp_name(name));
        match Self::stream_into(source, &temp, compression, hasher, cancel).await {
            Ok((size, written, hash)) => {
                debug!(temp = %temp.display(), size, written, %hash, "staged file");
                Ok(StagedFile { temp, target, size, written, compression, hash })
            },
            Err(err) => {
                remove_quietly(&temp).await;
                Err(err)
            },
        }
    }

    async fn commit(&self, staged: StagedFile) -> Result<PathBuf> {
        match place_unique(&staged.temp, &staged.target).await {
            Ok(path) => {
                debug!(path = %path.display(), "committed file");
                Ok(path)
            },
            Err(err) => {
                remove_quietly(&staged.temp).await;
                Err(err)
            },
        }
    }

    async fn discard(&self, staged: StagedFile) -> Result<()> {
        match fs::remove_file(&staged.temp).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
            Err(err) => exn::bail!(ErrorKind::from_io(err, &staged.temp)),
        }
    }

    #[instrument(skip_all, fields(path = %path.display(), recycle = move_to_recycle_bin))]
    async fn delete(&self, path: &Path, move_to_recycle_bin: bool) -> Result<Deleted> {
        let physical = self.physical(path)?;
        let metadata = fs::symlink_metadata(&physical).await.map_err(|e| ErrorKind::from_io(e, &physical))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::InvalidPath(physical));
        }
        if !move_to_recycle_bin {
            fs::remove_file(&physical).await.map_err(|e| ErrorKind::from_io(e, &physical))?;
            debug!("erased file");
            return Ok(Deleted::Erased(physical));
        }

        let name = physical.file_name().ok_or_raise(|| ErrorKind::InvalidPath(physical.clone()))?;
        let slot = self.recycle_bin.join(format!("{}-{}", UtcDateTime::now().unix_timestamp(), Uuid::new_v4()));
        fs::create_dir_all(&slot).await.map_err(|e| ErrorKind::from_io(e, &slot))?;
        let recycled = slot.join(name);
        if let Err(err) = move_file(&physical, &recycled).await {
            let _ = fs::remove_dir(&slot).await;
            return Err(err);
        }
        let origin = physical.to_string_lossy();
        if let Err(err) = fs::write(slot.join(ORIGIN_FILE), origin.as_bytes()).await {
            warn!(error = %err, "recycled file without an origin record; it cannot be restored automatically");
        }
        debug!(recycled = %recycled.display(), "moved file to recycle bin");
        Ok(Deleted::Recycled { from: physical, to: recycled })
    }

    #[instrument(skip_all, fields(recycled = %recycled.display()))]
    async fn restore(&self, recycled: &Path) -> Result<PathBuf> {
        let slot = recycled.parent().ok_or_raise(|| ErrorKind::InvalidPath(recycled.to_path_buf()))?;
        let origin_file = slot.join(ORIGIN_FILE);
        let origin = fs::read_to_string(&origin_file).await.map_err(|e| ErrorKind::from_io(e, &origin_file))?;
        let origin = PathBuf::from(origin.trim_end_matches(['\r', '\n']));
        if !origin.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(origin));
        }
        if let Some(parent) = origin.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ErrorKind::from_io(e, parent))?;
        }
        let restored = place_unique(recycled, &origin).await?;
        let _ = fs::remove_file(&origin_file).await;
        if let Err(err) = fs::remove_dir(slot).await {
            debug!(error = %err, "left recycle slot in place");
        }
        debug!(restored = %restored.display(), "restored file");
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Blake3Hasher;
    use rstest::rstest;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        source: PathBuf,
        writer: LocalWriter,
    }

    async fn fixture(content: &[u8]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("storage");
        let writer = LocalWriter::new(&root, root.join(".recycle")).unwrap();
        let source = dir.path().join("photo.jpg");
        fs::write(&source, content).await.unwrap();
        Fixture { _dir: dir, source, writer }
    }

    async fn visible_files(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    #[rstest]
    #[case("photo.jpg", 1, "photo (1).jpg")]
    #[case("photo.jpg.gz", 2, "photo (2).jpg.gz")]
    #[case("README", 1, "README (1)")]
    #[case(".hidden", 3, ".hidden (3)")]
    fn test_numbered(#[case] name: &str, #[case] n: usize, #[case] expected: &str) {
        let target = Path::new("/srv/hoard/Default").join(name);
        assert_eq!(numbered(&target, n), Path::new("/srv/hoard/Default").join(expected));
    }

    #[test]
    fn test_new_requires_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalWriter::new(dir.path(), dir.path().join(".recycle")).is_ok());
        assert!(LocalWriter::new("relative/root", "/tmp/recycle").is_err());
        assert!(LocalWriter::new(dir.path(), "relative/recycle").is_err());
    }

    #[tokio::test]
    async fn test_nothing_visible_until_commit() {
        let f = fixture(b"jpeg bytes").await;
        let cancel = CancellationToken::new();
        let staged = f.writer.save(&f.source, Path::new("Default"), Compression::None, &Blake3Hasher, &cancel).await.unwrap();
        let directory = f.writer.root().join("Default");
        assert!(!fs::try_exists(staged.target()).await.unwrap());
        assert!(fs::try_exists(staged.temp_path()).await.unwrap());
        assert_eq!(staged.size(), 10);

        let path = f.writer.commit(staged).await.unwrap();
        assert_eq!(path, directory.join("photo.jpg"));
        assert_eq!(fs::read(&path).await.unwrap(), b"jpeg bytes");
        assert_eq!(visible_files(&directory).await, vec!["photo.jpg"]);
    }

    #[tokio::test]
    async fn test_commit_never_overwrites() {
        let f = fixture(b"second").await;
        let directory = f.writer.create_dir(Path::new("Default")).await.unwrap();
        fs::write(directory.join("photo.jpg"), b"first").await.unwrap();
        let cancel = CancellationToken::new();

        let staged = f.writer.save(&f.source, Path::new("Default"), Compression::None, &Blake3Hasher, &cancel).await.unwrap();
        let path = f.writer.commit(staged).await.unwrap();
        assert_eq!(path, directory.join("photo (1).jpg"));
        assert_eq!(fs::read(directory.join("photo.jpg")).await.unwrap(), b"first");
        assert_eq!(fs::read(&path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_compressed_save() {
        let content = b"compress me please ".repeat(64);
        let f = fixture(&content).await;
        let cancel = CancellationToken::new();
        let staged = f.writer.save(&f.source, Path::new("Default/2024/05"), Compression::Gzip, &Blake3Hasher, &cancel).await.unwrap();
        assert_eq!(staged.size(), content.len() as u64);
        assert!(staged.written() < staged.size());
        assert_eq!(staged.hash(), ContentHash::of(&content));

        let path = f.writer.commit(staged).await.unwrap();
        assert_eq!(path, f.writer.root().join("Default/2024/05/photo.jpg.gz"));
        let stored = fs::read(&path).await.unwrap();
        assert_eq!(Compression::from_magic_bytes(&stored), Compression::Gzip);
        assert_eq!(Compression::Gzip.decompress(&stored).unwrap(), content);
    }

    #[tokio::test]
    async fn test_cancelled_save_leaves_nothing_behind() {
        let f = fixture(b"never stored").await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = f.writer.save(&f.source, Path::new("Default"), Compression::None, &Blake3Hasher, &cancel).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cancelled));
        assert!(visible_files(&f.writer.root().join("Default")).await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_without_hard_links() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("photo.jpg");
        fs::write(&target, b"first").await.unwrap();
        let staged = dir.path().join(".photo.jpg.tmp");
        fs::write(&staged, b"second").await.unwrap();

        let no_links = |_: PathBuf, _: PathBuf| async { Err::<(), _>(std::io::Error::from(IoErrorKind::PermissionDenied)) };
        let path = place_with(&staged, &target, no_links).await.unwrap();
        assert_eq!(path, dir.path().join("photo (1).jpg"));
        assert_eq!(fs::read(&path).await.unwrap(), b"second");
        assert_eq!(fs::read(&target).await.unwrap(), b"first");
        assert!(!fs::try_exists(&staged).await.unwrap());
    }

    #[tokio::test]
    async fn test_discard() {
        let f = fixture(b"changed my mind").await;
        let staged = f.writer.save(&f.source, Path::new("Default"), Compression::None, &Blake3Hasher, &CancellationToken::new()).await.unwrap();
        f.writer.discard(staged).await.unwrap();
        assert!(visible_files(&f.writer.root().join("Default")).await.is_empty());
    }

    #[tokio::test]
    async fn test_save_missing_source() {
        let f = fixture(b"").await;
        let missing = f.source.with_file_name("missing.jpg");
        let err = f.writer.save(&missing, Path::new("Default"), Compression::None, &Blake3Hasher, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if *p == missing));
    }

    #[tokio::test]
    async fn test_save_rejects_escaping_destination() {
        let f = fixture(b"data").await;
        let err = f.writer.save(&f.source, Path::new("../outside"), Compression::None, &Blake3Hasher, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_recycle_and_restore() {
        let f = fixture(b"precious").await;
        let staged = f.writer.save(&f.source, Path::new("Default"), Compression::None, &Blake3Hasher, &CancellationToken::new()).await.unwrap();
        let path = f.writer.commit(staged).await.unwrap();

        let deleted = f.writer.delete(&path, true).await.unwrap();
        let Deleted::Recycled { from, to } = &deleted else {
            panic!("expected a recycled file, got {deleted:?}");
        };
        assert_eq!(from, &path);
        assert!(to.starts_with(f.writer.recycle_bin()));
        assert_eq!(to.file_name().unwrap(), "photo.jpg");
        assert!(!fs::try_exists(&path).await.unwrap());
        assert_eq!(fs::read(to).await.unwrap(), b"precious");
        let origin = fs::read_to_string(to.with_file_name(ORIGIN_FILE)).await.unwrap();
        assert_eq!(Path::new(&origin), path);

        let restored = f.writer.restore(to).await.unwrap();
        assert_eq!(restored, path);
        assert_eq!(fs::read(&path).await.unwrap(), b"precious");
        assert!(!fs::try_exists(to.parent().unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_relative_path_permanently() {
        let f = fixture(b"gone").await;
        let staged = f.writer.save(&f.source, Path::new("Default"), Compression::None, &Blake3Hasher, &CancellationToken::new()).await.unwrap();
        let path = f.writer.commit(staged).await.unwrap();
        let deleted = f.writer.delete(Path::new("Default/photo.jpg"), false).await.unwrap();
        assert_eq!(deleted, Deleted::Erased(path.clone()));
        assert!(!fs::try_exists(&path).await.unwrap());
        assert!(!fs::try_exists(f.writer.recycle_bin()).await.unwrap());
    }

    #[tokio::test]
    #[rstest]
    #[case(true)]
    #[case(false)]
    async fn test_delete_missing_file(#[case] recycle: bool) {
        let f = fixture(b"").await;
        let missing = f.writer.root().join("Default/missing.jpg");
        let err = f.writer.delete(&missing, recycle).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if *p == missing));
    }
}
