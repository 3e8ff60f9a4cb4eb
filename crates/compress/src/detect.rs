use crate::Compression;
use crate::error::{Error, ErrorKind};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Bytes needed to recognize any supported format by its header.
pub const MAGIC_LEN: usize = 6;

const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
#[cfg(feature = "xz")]
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
#[cfg(feature = "zstd")]
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

impl FromStr for Compression {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(Compression::None),
            #[cfg(feature = "brotli")]
            "br" | "brotli" => Ok(Compression::Brotli),
            #[cfg(not(feature = "brotli"))]
            "br" | "brotli" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            "bz2" | "bzip2" => Ok(Compression::Bzip2),
            "gz" | "gzip" => Ok(Compression::Gzip),
            #[cfg(feature = "xz")]
            "xz" | "lzma" => Ok(Compression::Xz),
            #[cfg(not(feature = "xz"))]
            "xz" | "lzma" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            #[cfg(feature = "zstd")]
            "zst" | "zstd" => Ok(Compression::Zstd),
            #[cfg(not(feature = "zstd"))]
            "zst" | "zstd" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl Compression {
    /// Detect compression from the suffix of a file name.
    ///
    /// Only the final extension counts: `photo.jpg.gz` is Gzip, while a
    /// dotfile such as `.gz` has no extension and therefore no compression.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| match ext.to_lowercase().as_str() {
                #[cfg(feature = "brotli")]
                "br" => Compression::Brotli,
                "bz2" => Compression::Bzip2,
                "gz" => Compression::Gzip,
                #[cfg(feature = "xz")]
                "xz" => Compression::Xz,
                #[cfg(feature = "zstd")]
                "zst" => Compression::Zstd,
                _ => Compression::None,
            })
            .unwrap_or(Compression::None)
    }

    /// Detect compression format from magic bytes.
    ///
    /// Returns [`None`](Self::None) if no magic bytes match or the input is
    /// too short. Brotli has no magic bytes and is never detected.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Compression::Bzip2;
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            return Compression::Gzip;
        }
        #[cfg(feature = "xz")]
        if bytes.starts_with(&XZ_MAGIC) {
            return Compression::Xz;
        }
        #[cfg(feature = "zstd")]
        if bytes.starts_with(&ZSTD_MAGIC) {
            return Compression::Zstd;
        }
        Compression::None
    }

    /// The format a file really has, given that its name advertises `self`
    /// and its content starts with `head` (at least [`MAGIC_LEN`] bytes
    /// when the file is that long).
    ///
    /// Only a compressed suffix is checked: uncompressed content may well
    /// start with a compression header of its own. Brotli has no magic bytes
    /// and is taken on trust.
    ///
    /// ```
    /// use hoard_compress::Compression;
    ///
    /// assert_eq!(Compression::Gzip.confirm(&[0x1F, 0x8B, 0x08]), Compression::Gzip);
    /// assert_eq!(Compression::Gzip.confirm(b"plain text"), Compression::None);
    /// assert_eq!(Compression::None.confirm(&[0x1F, 0x8B, 0x08]), Compression::None);
    /// ```
    #[must_use]
    pub fn confirm(self, head: &[u8]) -> Self {
        match self {
            Compression::None => Compression::None,
            #[cfg(feature = "brotli")]
            Compression::Brotli => Compression::Brotli,
            _ => Self::from_magic_bytes(head),
        }
    }

    /// Append this format's suffix to the file name of `path`.
    ///
    /// [`None`](Self::None) returns the path unchanged.
    #[must_use]
    pub fn with_suffix(&self, path: impl AsRef<Path>) -> PathBuf {
        let mut name = OsString::from(path.as_ref().as_os_str());
        name.push(self.extension());
        PathBuf::from(name)
    }

    /// Split a path into its uncompressed form and the compression its
    /// suffix advertises.
    ///
    /// ```
    /// use std::path::Path;
    /// use hoard_compress::Compression;
    ///
    /// let (plain, format) = Compression::strip_suffix("album/photo.jpg.gz");
    /// assert_eq!(plain, Path::new("album/photo.jpg"));
    /// assert_eq!(format, Compression::Gzip);
    /// ```
    #[must_use]
    pub fn strip_suffix(path: impl AsRef<Path>) -> (PathBuf, Self) {
        let path = path.as_ref();
        match Self::from_path(path) {
            Compression::None => (path.to_path_buf(), Compression::None),
            format => (path.with_extension(""), format),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case("none", Compression::None)]
    #[case("bz2", Compression::Bzip2)]
    #[case("BZIP2", Compression::Bzip2)]
    #[case("gz", Compression::Gzip)]
    #[case(" gzip ", Compression::Gzip)]
    #[cfg_attr(feature = "brotli", case("brotli", Compression::Brotli))]
    #[cfg_attr(feature = "xz", case("lzma", Compression::Xz))]
    #[cfg_attr(feature = "zstd", case("zst", Compression::Zstd))]
    fn test_from_str(#[case] test: &str, #[case] expected: Compression) {
        assert_eq!(test.parse::<Compression>().unwrap(), expected);
    }

    #[rstest]
    #[case("lz4")]
    #[case("definitely not valid")]
    fn test_from_str_invalid(#[case] test: &str) {
        assert!(test.parse::<Compression>().is_err());
    }

    #[rstest]
    #[case("photo.jpg", Compression::None)]
    #[case(".gz", Compression::None)]
    #[case("photo.jpg.gz", Compression::Gzip)]
    #[case("Default/2024/05/notes.txt.bz2", Compression::Bzip2)]
    #[case("archive.GZ", Compression::Gzip)]
    fn test_from_path(#[case] test: &str, #[case] expected: Compression) {
        assert_eq!(Compression::from_path(test), expected);
    }

    #[rstest]
    #[case(b"\xFF\xD8\xFF\xE0", Compression::None)]
    #[case(b"", Compression::None)]
    #[case(&[0x42, 0x5A, 0x68, 0x39], Compression::Bzip2)]
    #[case(&[0x1F, 0x8B, 0x08, 0x00], Compression::Gzip)]
    fn test_from_magic_bytes(#[case] bytes: &[u8], #[case] expected: Compression) {
        assert_eq!(Compression::from_magic_bytes(bytes), expected);
    }

    #[rstest]
    #[case(Compression::Gzip, &[0x1F, 0x8B, 0x08, 0x00], Compression::Gzip)]
    #[case(Compression::Gzip, &[0x42, 0x5A, 0x68, 0x39], Compression::Bzip2)]
    #[case(Compression::Bzip2, b"not compressed", Compression::None)]
    #[case(Compression::Gzip, b"", Compression::None)]
    #[case(Compression::None, &[0x42, 0x5A, 0x68, 0x39], Compression::None)]
    fn test_confirm(#[case] advertised: Compression, #[case] head: &[u8], #[case] expected: Compression) {
        assert_eq!(advertised.confirm(head), expected);
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(Compression::Gzip.with_suffix("relative/old.txt"), Path::new("relative/old.txt.gz"));
        assert_eq!(Compression::None.with_suffix("relative/old.txt"), Path::new("relative/old.txt"));
        assert_eq!(Compression::Bzip2.with_suffix("/abs/no-extension"), Path::new("/abs/no-extension.bz2"));
    }

    #[test]
    fn test_strip_suffix_without_compression() {
        let (plain, format) = Compression::strip_suffix("notes.txt");
        assert_eq!(plain, Path::new("notes.txt"));
        assert_eq!(format, Compression::None);
    }
}
