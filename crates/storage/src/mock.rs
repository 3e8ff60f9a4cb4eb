//! In-memory test doubles.

use crate::error::{ErrorKind, Result};
use crate::hash::{ContentHash, Digest, Hasher};
use crate::path::{anchor, validate as validate_path};
use crate::resolve::PathResolver;
use crate::writer::{Deleted, ORIGIN_FILE, StagedFile, StorageWriter, numbered, temp_name};
use async_trait::async_trait;
use exn::OptionExt;
use hoard_compress::Compression;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// In-memory storage for testing.
///
/// Files live in a `HashMap` keyed by absolute path (relative paths are
/// anchored at [`MockStorage::ROOT`]). Sources passed to
/// [`save`](StorageWriter::save) are read from the map when present, and
/// from the real filesystem otherwise. Implements both [`StorageWriter`] and
/// [`PathResolver`] over the same set of files.
pub struct MockStorage {
    root: PathBuf,
    recycle_bin: PathBuf,
    suffix: Compression,
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MockStorage {
    pub const ROOT: &'static str = "/mock";

    /// Create mock storage pre-populated with files.
    ///
    /// Panics if a relative path fails validation. If test setup is wrong,
    /// then the test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let root = PathBuf::from(Self::ROOT);
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let path = match path.is_absolute() {
                true => path,
                false => match validate_path(&path) {
                    Ok(valid) => root.join(valid),
                    Err(_) => panic!("MockStorage::with_files: invalid path {}", path.display()),
                },
            };
            map.insert(path, data.into());
        }
        Self {
            recycle_bin: root.join(".recycle"),
            root,
            suffix: Compression::Gzip,
            files: RwLock::new(map),
        }
    }

    /// Change the format whose suffix marks compressed variants.
    pub fn with_suffix(mut self, suffix: Compression) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn recycle_bin(&self) -> &Path {
        &self.recycle_bin
    }

    /// Contents of a stored file (absolute, or relative to the root).
    pub async fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.read().await.get(&anchor(&self.root, path.as_ref())).cloned()
    }

    /// Every stored path, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn physical(&self, path: &Path) -> Result<PathBuf> {
        match path.is_absolute() {
            true => Ok(path.to_path_buf()),
            false => Ok(self.root.join(validate_path(path)?)),
        }
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageWriter for MockStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn create_dir(&self, relative: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(relative)?))
    }

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
        let stored = self.files.read().await.get(source).cloned();
        let data = match stored {
            Some(data) => data,
            None => tokio::fs::read(source).await.map_err(|e| ErrorKind::from_io(e, source))?,
        };
        if cancel.is_cancelled() {
            exn::bail!(ErrorKind::Cancelled);
        }
        let mut digest = hasher.digest();
        digest.update(&data);
        let content = match compression {
            Compression::None => data.clone(),
            format => format.compress(&data).map_err(ErrorKind::compression)?,
        };
        let staged = StagedFile {
            temp: directory.join(temp_name(name)),
            target: compression.with_suffix(directory.join(name)),
            size: data.len() as u64,
            written: content.len() as u64,
            compression,
            hash: digest.finalize(),
        };
        self.files.write().await.insert(staged.temp.clone(), content);
        Ok(staged)
    }

    async fn commit(&self, staged: StagedFile) -> Result<PathBuf> {
        let mut files = self.files.write().await;
        let content = files.remove(&staged.temp).ok_or_raise(|| ErrorKind::NotFound(staged.temp.clone()))?;
        let path = (0..)
            .map(|n| match n {
                0 => staged.target.clone(),
                n => numbered(&staged.target, n),
            })
            .find(|candidate| !files.contains_key(candidate))
            .ok_or_raise(|| ErrorKind::AlreadyExists(staged.target.clone()))?;
        files.insert(path.clone(), content);
        Ok(path)
    }

    async fn discard(&self, staged: StagedFile) -> Result<()> {
        self.files.write().await.remove(&staged.temp);
        Ok(())
    }

    async fn delete(&self, path: &Path, move_to_recycle_bin: bool) -> Result<Deleted> {
        let physical = self.physical(path)?;
        let mut files = self.files.write().await;
        let content = files.remove(&physical).ok_or_raise(|| ErrorKind::NotFound(physical.clone()))?;
        if !move_to_recycle_bin {
            return Ok(Deleted::Erased(physical));
        }
        let name = physical.file_name().ok_or_raise(|| ErrorKind::InvalidPath(physical.clone()))?;
        let slot = self.recycle_bin.join(format!("0-{}", Uuid::new_v4()));
        let recycled = slot.join(name);
        files.insert(slot.join(ORIGIN_FILE), physical.to_string_lossy().into_owned().into_bytes());
        files.insert(recycled.clone(), content);
        Ok(Deleted::Recycled { from: physical, to: recycled })
    }

    async fn restore(&self, recycled: &Path) -> Result<PathBuf> {
        let slot = recycled.parent().ok_or_raise(|| ErrorKind::InvalidPath(recycled.to_path_buf()))?;
        let mut files = self.files.write().await;
        let origin = files.remove(&slot.join(ORIGIN_FILE)).ok_or_raise(|| ErrorKind::NotFound(slot.join(ORIGIN_FILE)))?;
        let origin = PathBuf::from(String::from_utf8_lossy(&origin).into_owned());
        let content = files.remove(recycled).ok_or_raise(|| ErrorKind::NotFound(recycled.to_path_buf()))?;
        let path = (0..)
            .map(|n| match n {
                0 => origin.clone(),
                n => numbered(&origin, n),
            })
            .find(|candidate| !files.contains_key(candidate))
            .ok_or_raise(|| ErrorKind::AlreadyExists(origin.clone()))?;
        files.insert(path.clone(), content);
        Ok(path)
    }
}

#[async_trait]
impl PathResolver for MockStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn suffix(&self) -> Compression {
        self.suffix
    }

    fn working_dir(&self) -> Option<&Path> {
        None
    }

    async fn is_file(&self, path: &Path) -> bool {
        self.files.read().await.contains_key(path)
    }

    async fn siblings(&self, directory: &Path) -> Vec<String> {
        let mut names: Vec<_> = self
            .files
            .read()
            .await
            .keys()
            .filter(|path| path.parent() == Some(directory))
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn head(&self, path: &Path, len: usize) -> Vec<u8> {
        match self.files.read().await.get(path) {
            Some(data) => data.iter().copied().take(len).collect(),
            None => Vec::new(),
        }
    }
}

/// Hasher that reports the same hash for every stream.
///
/// Still drains the stream (honouring cancellation) so callers observe the
/// same I/O behaviour as with a real hasher. Useful for forcing "different
/// bytes, same hash" situations.
#[derive(Clone, Copy, Debug)]
pub struct FixedHasher(pub ContentHash);

struct FixedDigest(ContentHash);

impl Digest for FixedDigest {
    fn update(&mut self, _: &[u8]) {}

    fn finalize(self: Box<Self>) -> ContentHash {
        self.0
    }
}

#[async_trait]
impl Hasher for FixedHasher {
    fn digest(&self) -> Box<dyn Digest> {
        Box::new(FixedDigest(self.0))
    }
}
