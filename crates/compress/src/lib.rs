//! Compression formats for stored file variants.
//!
//! A stored file is either kept as-is or wrapped in a compressed container.
//! The container format is recorded in the file name as a recognizable
//! suffix (`photo.jpg.gz`), which is how later path resolution knows to
//! expect a compressed variant. This crate provides:
//!
//! - **Suffix handling** ([`Compression::from_path`], [`Compression::with_suffix`],
//!   [`Compression::strip_suffix`])
//! - **Magic byte detection** ([`Compression::from_magic_bytes`],
//!   [`Compression::confirm`]) for cross-checking a suffix against actual
//!   file contents
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Streaming** via wrapped readers/writers ([`Compression::wrap_reader`],
//!   [`Compression::wrap_writer`]), and async counterparts behind the `async`
//!   feature using [`futures`](::futures::io) traits (not Tokio).
//!
//! Bzip2 and Gzip are always available. Brotli, XZ and Zstd are behind
//! feature flags. All formats use their highest compression level; stored
//! files are written once and read rarely.

mod detect;
pub mod error;
#[cfg(feature = "async")]
mod futures;
mod ops;

pub use detect::MAGIC_LEN;
#[cfg(feature = "async")]
pub use futures::{BoxAsyncRead, BoxAsyncWrite};

/// A supported compression format.
///
/// Variants gated behind feature flags (`brotli`, `xz`, `zstd`) are only
/// available when the corresponding feature is enabled. Defaults to
/// [`None`](Self::None) (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Brotli compression (.br)
    #[cfg(feature = "brotli")]
    Brotli,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    #[cfg(feature = "xz")]
    Xz,
    /// Zstd compression (.zst)
    #[cfg(feature = "zstd")]
    Zstd,
}

impl Compression {
    /// Every compressed format enabled in this build, in suffix-matching order.
    pub const COMPRESSED: &'static [Compression] = &[
        #[cfg(feature = "brotli")]
        Compression::Brotli,
        Compression::Bzip2,
        Compression::Gzip,
        #[cfg(feature = "xz")]
        Compression::Xz,
        #[cfg(feature = "zstd")]
        Compression::Zstd,
    ];

    /// Returns the file name suffix (including the leading dot) that marks a
    /// compressed variant, or an empty string for [`None`](Self::None).
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            #[cfg(feature = "brotli")]
            Compression::Brotli => ".br",
            Compression::Bzip2 => ".bz2",
            Compression::Gzip => ".gz",
            #[cfg(feature = "xz")]
            Compression::Xz => ".xz",
            #[cfg(feature = "zstd")]
            Compression::Zstd => ".zst",
        }
    }

    /// Short name used in configuration and persisted records.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            #[cfg(feature = "brotli")]
            Compression::Brotli => "brotli",
            Compression::Bzip2 => "bzip2",
            Compression::Gzip => "gzip",
            #[cfg(feature = "xz")]
            Compression::Xz => "xz",
            #[cfg(feature = "zstd")]
            Compression::Zstd => "zstd",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Compression::None)
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
