//! Mapping stored paths back to physical files.
//!
//! Records outlive storage layouts: files get compressed after the fact, the
//! storage root moves, or a record written by an older layout holds a path
//! relative to wherever the process happened to run. Resolution therefore
//! walks an ordered list of candidate locations and settles on the first one
//! that is a regular file. Nothing here ever modifies the filesystem.

use async_trait::async_trait;
use derive_more::Display;
use hoard_compress::{Compression, MAGIC_LEN};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Which rule produced a candidate path.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Step {
    #[display("as recorded")]
    Recorded,
    #[display("compressed variant")]
    Compressed,
    #[display("storage root")]
    StorageRoot,
    #[display("storage root, compressed variant")]
    StorageRootCompressed,
    #[display("working directory")]
    WorkingDir,
    #[display("working directory, compressed variant")]
    WorkingDirCompressed,
}

/// A candidate location and whether a file was found there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checked {
    pub step: Step,
    pub path: PathBuf,
    pub exists: bool,
}

/// The result of resolving a stored path.
///
/// Not finding a file is an expected outcome, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Found {
        path: PathBuf,
        /// Compression of the file that was found: advertised by its suffix
        /// and confirmed by its leading bytes.
        compression: Compression,
        step: Step,
        checked: Vec<Checked>,
    },
    NotFound {
        /// Names of the files next to an absolute stored path, for
        /// diagnostics only.
        siblings: Vec<String>,
        checked: Vec<Checked>,
    },
}

impl Resolution {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Found { path, .. } => Some(path),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Resolution::Found { path, .. } => Some(path),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }

    /// Every candidate that was probed, in order.
    pub fn checked(&self) -> &[Checked] {
        match self {
            Resolution::Found { checked, .. } | Resolution::NotFound { checked, .. } => checked,
        }
    }
}

/// Build the ordered, de-duplicated candidate list for `stored`.
///
/// 1. The stored path as recorded.
/// 2. The same with `suffix` appended.
/// 3. For relative paths, anchored at `root` (then its compressed variant).
/// 4. For relative paths, anchored at `working_dir` (then its compressed
///    variant).
///
/// A stored path that already ends in a known compression suffix never gets
/// a second one. Relative paths in step 1 and 2 are interpreted against
/// `working_dir` when one is given, so equivalent candidates collapse into
/// the first occurrence.
pub fn candidates(stored: &Path, root: &Path, working_dir: Option<&Path>, suffix: Compression) -> Vec<(Step, PathBuf)> {
    let variant = |path: &Path| -> Option<PathBuf> {
        (suffix.is_compressed() && !Compression::from_path(path).is_compressed()).then(|| suffix.with_suffix(path))
    };
    let effective = |path: &Path| match (path.is_relative(), working_dir) {
        (true, Some(cwd)) => cwd.join(path),
        _ => path.to_path_buf(),
    };

    let mut list = vec![(Step::Recorded, effective(stored))];
    if let Some(compressed) = variant(stored) {
        list.push((Step::Compressed, effective(&compressed)));
    }
    if stored.is_relative() {
        for (anchor, plain, compressed) in [
            (Some(root), Step::StorageRoot, Step::StorageRootCompressed),
            (working_dir, Step::WorkingDir, Step::WorkingDirCompressed),
        ] {
            let Some(anchor) = anchor else { continue };
            let anchored = anchor.join(stored);
            let alternate = variant(&anchored);
            list.push((plain, anchored));
            list.extend(alternate.map(|path| (compressed, path)));
        }
    }

    let mut seen = HashSet::new();
    list.retain(|(_, path)| seen.insert(path.clone()));
    list
}

/// Resolves stored paths to physical files.
///
/// Implementors only describe how to probe for files; the candidate walk is
/// shared.
#[async_trait]
pub trait PathResolver: Send + Sync {
    /// Storage root that relative stored paths are anchored to.
    fn root(&self) -> &Path;

    /// Format whose suffix marks a compressed variant.
    fn suffix(&self) -> Compression;

    /// Directory that relative paths were historically written against.
    fn working_dir(&self) -> Option<&Path>;

    /// Whether `path` names an existing regular file.
    async fn is_file(&self, path: &Path) -> bool;

    /// Names of the files in `directory`, sorted.
    async fn siblings(&self, directory: &Path) -> Vec<String>;

    /// Up to `len` leading bytes of the file at `path`. Empty when it cannot
    /// be read.
    async fn head(&self, path: &Path, len: usize) -> Vec<u8>;

    /// Resolve `stored` to a physical file.
    ///
    /// `is_compressed` is the caller's expectation; the search order does
    /// not depend on it, but a hit whose compression disagrees is logged so
    /// the record can be repaired. A compressed suffix is checked against
    /// the file's magic bytes, and content that does not match is reported
    /// as uncompressed.
    async fn resolve(&self, stored: &Path, is_compressed: bool) -> Resolution {
        let mut checked = Vec::new();
        for (step, path) in candidates(stored, self.root(), self.working_dir(), self.suffix()) {
            let exists = self.is_file(&path).await;
            debug!(%step, path = %path.display(), exists, "checked candidate");
            checked.push(Checked { step, path: path.clone(), exists });
            if exists {
                let advertised = Compression::from_path(&path);
                let compression = match advertised.is_compressed() {
                    true => advertised.confirm(&self.head(&path, MAGIC_LEN).await),
                    false => advertised,
                };
                if compression != advertised {
                    warn!(
                        path = %path.display(),
                        %advertised,
                        detected = %compression,
                        "file content does not match its compression suffix"
                    );
                }
                if compression.is_compressed() != is_compressed {
                    warn!(
                        stored = %stored.display(),
                        path = %path.display(),
                        expected_compressed = is_compressed,
                        %compression,
                        "resolved file disagrees with the recorded compression flag"
                    );
                }
                return Resolution::Found { path, compression, step, checked };
            }
        }

        let siblings = match stored.is_absolute() {
            true => match stored.parent() {
                Some(directory) => self.siblings(directory).await,
                None => Vec::new(),
            },
            false => Vec::new(),
        };
        debug!(stored = %stored.display(), ?siblings, "stored path did not resolve");
        Resolution::NotFound { siblings, checked }
    }
}

/// Resolves against the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalResolver {
    root: PathBuf,
    suffix: Compression,
    working_dir: Option<PathBuf>,
}

impl LocalResolver {
    /// Resolver anchored at `root`, using the process's current directory as
    /// the working directory.
    pub fn new(root: impl Into<PathBuf>, suffix: Compression) -> Self {
        Self {
            root: root.into(),
            suffix,
            working_dir: std::env::current_dir().ok(),
        }
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }
}

#[async_trait]
impl PathResolver for LocalResolver {
    fn root(&self) -> &Path {
        &self.root
    }

    fn suffix(&self) -> Compression {
        self.suffix
    }

    fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    async fn is_file(&self, path: &Path) -> bool {
        match fs::metadata(path).await {
            Ok(metadata) => metadata.is_file(),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %err, "could not inspect candidate");
                }
                false
            },
        }
    }

    async fn siblings(&self, directory: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(mut entries) = fs::read_dir(directory).await else {
            return names;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.is_ok_and(|kind| kind.is_file()) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        names
    }

    async fn head(&self, path: &Path, len: usize) -> Vec<u8> {
        let mut head = Vec::with_capacity(len);
        let Ok(file) = fs::File::open(path).await else {
            return head;
        };
        if let Err(err) = file.take(len as u64).read_to_end(&mut head).await {
            debug!(path = %path.display(), error = %err, "could not read file header");
            head.clear();
        }
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        resolver: LocalResolver,
    }
    impl Fixture {
        fn root(&self) -> PathBuf {
            self.dir.path().join("storage")
        }

        fn cwd(&self) -> PathBuf {
            self.dir.path().join("cwd")
        }

        async fn touch(&self, path: impl AsRef<Path>) -> PathBuf {
            let path = path.as_ref().to_path_buf();
            fs::create_dir_all(path.parent().unwrap()).await.unwrap();
            let format = Compression::from_path(&path);
            let content = match format.is_compressed() {
                true => format.compress(b"content").unwrap(),
                false => b"content".to_vec(),
            };
            fs::write(&path, content).await.unwrap();
            path
        }
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("storage")).await.unwrap();
        fs::create_dir_all(dir.path().join("cwd")).await.unwrap();
        let resolver = LocalResolver::new(dir.path().join("storage"), Compression::Gzip)
            .with_working_dir(dir.path().join("cwd"));
        Fixture { dir, resolver }
    }

    #[test]
    fn test_candidate_order_for_relative_path() {
        let steps = candidates(
            Path::new("relative/old.txt"),
            Path::new("/srv/hoard"),
            Some(Path::new("/home/user")),
            Compression::Gzip,
        );
        assert_eq!(
            steps,
            vec![
                (Step::Recorded, PathBuf::from("/home/user/relative/old.txt")),
                (Step::Compressed, PathBuf::from("/home/user/relative/old.txt.gz")),
                (Step::StorageRoot, PathBuf::from("/srv/hoard/relative/old.txt")),
                (Step::StorageRootCompressed, PathBuf::from("/srv/hoard/relative/old.txt.gz")),
            ]
        );
    }

    #[test]
    fn test_candidates_for_absolute_path() {
        let steps = candidates(Path::new("/mnt/photos/a.jpg"), Path::new("/srv/hoard"), None, Compression::Gzip);
        assert_eq!(
            steps,
            vec![
                (Step::Recorded, PathBuf::from("/mnt/photos/a.jpg")),
                (Step::Compressed, PathBuf::from("/mnt/photos/a.jpg.gz")),
            ]
        );
    }

    #[rstest]
    #[case("Default/a.jpg.gz")]
    #[case("Default/a.jpg.bz2")]
    fn test_no_double_suffix(#[case] stored: &str) {
        let steps = candidates(Path::new(stored), Path::new("/srv/hoard"), None, Compression::Gzip);
        let steps: Vec<_> = steps.iter().map(|(step, _)| *step).collect();
        assert_eq!(steps, vec![Step::Recorded, Step::StorageRoot]);
    }

    #[test]
    fn test_root_equal_to_cwd_collapses() {
        let steps = candidates(Path::new("a.txt"), Path::new("/srv"), Some(Path::new("/srv")), Compression::Gzip);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].0, Step::Recorded);
        assert_eq!(steps[1].0, Step::Compressed);
    }

    #[tokio::test]
    async fn test_relative_path_finds_compressed_variant_under_root() {
        let f = fixture().await;
        let expected = f.touch(f.root().join("relative/old.txt.gz")).await;
        let resolution = f.resolver.resolve(Path::new("relative/old.txt"), false).await;
        let Resolution::Found { path, compression, step, checked } = resolution else {
            panic!("expected the compressed variant to be found");
        };
        assert_eq!(path, expected);
        assert_eq!(compression, Compression::Gzip);
        assert_eq!(step, Step::StorageRootCompressed);
        assert_eq!(checked.len(), 4);
        assert!(checked[..3].iter().all(|c| !c.exists));
        assert!(checked[3].exists);
    }

    #[tokio::test]
    async fn test_mislabeled_variant_reports_actual_compression() {
        let f = fixture().await;
        let path = f.root().join("Default/notes.txt.gz");
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, b"plain text after all").await.unwrap();
        let resolution = f.resolver.resolve(Path::new("Default/notes.txt"), true).await;
        let Resolution::Found { path: found, compression, .. } = resolution else {
            panic!("the variant should still be found");
        };
        assert_eq!(found, path);
        assert_eq!(compression, Compression::None);
    }

    #[tokio::test]
    async fn test_uncompressed_preferred_when_both_exist() {
        let f = fixture().await;
        let plain = f.touch(f.root().join("Default/a.txt")).await;
        f.touch(f.root().join("Default/a.txt.gz")).await;
        let resolution = f.resolver.resolve(&plain, false).await;
        assert_eq!(resolution.path(), Some(plain.as_path()));
    }

    #[tokio::test]
    async fn test_working_dir_fallback() {
        let f = fixture().await;
        let expected = f.touch(f.cwd().join("legacy/notes.txt")).await;
        let resolution = f.resolver.resolve(Path::new("legacy/notes.txt"), false).await;
        assert_eq!(resolution.into_path(), Some(expected));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let f = fixture().await;
        f.touch(f.root().join("Default/a.txt.gz")).await;
        let first = f.resolver.resolve(Path::new("Default/a.txt"), true).await;
        let second = f.resolver.resolve(Path::new("Default/a.txt"), true).await;
        assert!(first.is_found());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_absolute_miss_lists_siblings() {
        let f = fixture().await;
        f.touch(f.root().join("Default/b.txt")).await;
        f.touch(f.root().join("Default/a.txt")).await;
        fs::create_dir_all(f.root().join("Default/2024")).await.unwrap();
        let resolution = f.resolver.resolve(&f.root().join("Default/missing.txt"), false).await;
        let Resolution::NotFound { siblings, checked } = resolution else {
            panic!("nothing should resolve");
        };
        assert_eq!(siblings, vec!["a.txt", "b.txt"]);
        assert_eq!(checked.len(), 2);
    }

    #[tokio::test]
    async fn test_relative_miss_has_no_siblings() {
        let f = fixture().await;
        let resolution = f.resolver.resolve(Path::new("nowhere/missing.txt"), false).await;
        assert!(matches!(&resolution, Resolution::NotFound { siblings, .. } if siblings.is_empty()));
        // Working-directory candidates collapse into the recorded ones.
        assert_eq!(resolution.checked().len(), 4);
    }

    #[tokio::test]
    async fn test_directories_never_match() {
        let f = fixture().await;
        fs::create_dir_all(f.root().join("Default")).await.unwrap();
        assert!(!f.resolver.resolve(Path::new("Default"), false).await.is_found());
    }
}
