//! Content hashing.
//!
//! Every stored file is identified by the BLAKE3 digest of its original,
//! uncompressed bytes. The digest is the deduplication key, so it must be
//! computed over the entire stream: a read error aborts hashing rather than
//! hashing what was read so far.

use crate::error::{Error, ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use hoard_compress::Compression;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::compat::{FuturesAsyncReadCompatExt, TokioAsyncReadCompatExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bytes read per iteration; cancellation is checked between chunks.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A 256-bit BLAKE3 digest of a file's uncompressed content.
///
/// Displays (and parses) as 64 lowercase hex characters, which is also the
/// form persisted in the metadata store.
///
/// ```
/// use hoard_storage::ContentHash;
///
/// let hash = ContentHash::of(b"holiday snaps");
/// let parsed: ContentHash = hash.to_string().parse().unwrap();
/// assert_eq!(hash, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; blake3::OUT_LEN]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; blake3::OUT_LEN]) -> Self {
        Self(bytes)
    }

    /// Hash an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; blake3::OUT_LEN] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(blake3::Hash::from_bytes(self.0).to_hex().as_str())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

impl FromStr for ContentHash {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let hash = blake3::Hash::from_hex(s).or_raise(|| ErrorKind::InvalidHash(s.to_string()))?;
        Ok(Self(*hash.as_bytes()))
    }
}

/// Running state of one hash computation, fed chunk by chunk.
pub trait Digest: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> ContentHash;
}

impl Digest for blake3::Hasher {
    fn update(&mut self, data: &[u8]) {
        blake3::Hasher::update(self, data);
    }

    fn finalize(self: Box<Self>) -> ContentHash {
        ContentHash(*blake3::Hasher::finalize(&self).as_bytes())
    }
}

/// Computes content hashes from byte streams.
///
/// Writers feed the same [`Digest`] while staging, so the hash of what was
/// stored can be checked against the hash that was deduplicated on.
#[async_trait]
pub trait Hasher: Send + Sync {
    /// Start a new, empty digest.
    fn digest(&self) -> Box<dyn Digest>;

    /// Hash everything `reader` yields until EOF.
    ///
    /// Returns [`Cancelled`](ErrorKind::Cancelled) if `cancel` fires before
    /// the stream is exhausted, and [`Io`](ErrorKind::Io) if a read fails.
    async fn compute_hash(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<ContentHash> {
        let mut digest = self.digest();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut total: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                exn::bail!(ErrorKind::Cancelled);
            }
            let read = reader.read(&mut buffer).await.map_err(ErrorKind::Io)?;
            if read == 0 {
                break;
            }
            digest.update(&buffer[..read]);
            total += read as u64;
        }
        let hash = digest.finalize();
        debug!(bytes = total, %hash, "hashed stream");
        Ok(hash)
    }

    /// Hash a file on disk.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the file does not exist.
    async fn hash_file(&self, path: &Path, cancel: &CancellationToken) -> Result<ContentHash> {
        let mut file = File::open(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        self.compute_hash(&mut file, cancel).await
    }

    /// Hash the original content of a stored file, decompressing it on the
    /// fly when it was stored compressed.
    async fn hash_stored(
        &self,
        path: &Path,
        compression: Compression,
        cancel: &CancellationToken,
    ) -> Result<ContentHash> {
        let file = File::open(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        let mut reader = compression.async_wrap_reader(file.compat()).compat();
        self.compute_hash(&mut reader, cancel).await
    }
}

/// Streaming BLAKE3 hasher.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Hasher;

#[async_trait]
impl Hasher for Blake3Hasher {
    fn digest(&self) -> Box<dyn Digest> {
        Box::new(blake3::Hasher::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Yields some bytes, then fails.
    struct BrokenReader {
        served: bool,
    }
    impl AsyncRead for BrokenReader {
        fn poll_read(mut self: Pin<&mut Self>, _: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
            if self.served {
                return Poll::Ready(Err(std::io::Error::other("disk on fire")));
            }
            self.served = true;
            buf.put_slice(b"partial");
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_stream_hash_matches_in_memory_hash() {
        let data = vec![7u8; CHUNK_SIZE * 3 + 17];
        let hash = Blake3Hasher.compute_hash(&mut data.as_slice(), &CancellationToken::new()).await.unwrap();
        assert_eq!(hash, ContentHash::of(&data));
    }

    #[tokio::test]
    async fn test_distinct_content_distinct_hash() {
        let cancel = CancellationToken::new();
        let a = Blake3Hasher.compute_hash(&mut &b"IMG_0001"[..], &cancel).await.unwrap();
        let b = Blake3Hasher.compute_hash(&mut &b"IMG_0002"[..], &cancel).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_partial_read_is_never_hashed() {
        let mut reader = BrokenReader { served: false };
        let err = Blake3Hasher.compute_hash(&mut reader, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_completion() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = Blake3Hasher.compute_hash(&mut &b"data"[..], &cancel).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_hash_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jpg");
        let err = Blake3Hasher.hash_file(&missing, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if *p == missing));
    }

    #[tokio::test]
    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Gzip)]
    #[case(Compression::Bzip2)]
    async fn test_stored_hash_ignores_compression(#[case] format: Compression) {
        let dir = tempfile::tempdir().unwrap();
        let original = b"the same photo, however it is stored".repeat(100);
        let path = format.with_suffix(dir.path().join("photo.jpg"));
        tokio::fs::write(&path, format.compress(&original).unwrap()).await.unwrap();
        let hash = Blake3Hasher.hash_stored(&path, format, &CancellationToken::new()).await.unwrap();
        assert_eq!(hash, ContentHash::of(&original));
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("zz2f4b5d6e7f8091a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f70819")]
    fn test_invalid_hex(#[case] input: &str) {
        let err = input.parse::<ContentHash>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidHash(s) if s == input));
    }

    #[test]
    fn test_digest_matches_one_shot_hash() {
        let mut digest = Blake3Hasher.digest();
        digest.update(b"holiday ");
        digest.update(b"snaps");
        assert_eq!(digest.finalize(), ContentHash::of(b"holiday snaps"));
    }

    #[test]
    fn test_display_is_lowercase_hex() {
        let text = ContentHash::of(b"x").to_string();
        assert_eq!(text.len(), 64);
        assert!(text.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
