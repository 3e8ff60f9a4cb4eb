//! Async compression and decompression (feature-gated behind `async`).
//!
//! Uses [`futures::io`] traits rather than Tokio-specific types so callers on
//! any runtime can use them; Tokio users bridge with `tokio_util::compat`.

use crate::Compression;
#[cfg(feature = "brotli")]
use async_compression::futures::{bufread::BrotliDecoder, write::BrotliEncoder};
use async_compression::futures::{bufread::BzDecoder, write::BzEncoder};
use async_compression::futures::{bufread::GzipDecoder, write::GzipEncoder};
#[cfg(feature = "xz")]
use async_compression::futures::{bufread::XzDecoder, write::XzEncoder};
#[cfg(feature = "zstd")]
use async_compression::futures::{bufread::ZstdDecoder, write::ZstdEncoder};
use async_compression::Level;
use futures::io::{AsyncRead, AsyncWrite, BufReader as AsyncBufReader};

pub type BoxAsyncRead<'a> = Box<dyn AsyncRead + Unpin + Send + 'a>;
pub type BoxAsyncWrite<'a> = Box<dyn AsyncWrite + Unpin + Send + 'a>;

impl Compression {
    /// Wrap an async reader with the matching decompression layer.
    ///
    /// The reader is buffered internally; decoder initialization errors are
    /// deferred until the first read.
    pub fn async_wrap_reader<'a, R: AsyncRead + Unpin + Send + 'a>(&self, reader: R) -> BoxAsyncRead<'a> {
        let reader = AsyncBufReader::new(reader);
        match self {
            Compression::None => Box::new(reader),
            #[cfg(feature = "brotli")]
            Compression::Brotli => Box::new(BrotliDecoder::new(reader)),
            Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
            Compression::Gzip => Box::new(GzipDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdDecoder::new(reader)),
        }
    }

    /// Wrap an async writer with the matching compression layer.
    ///
    /// The caller **must** call [`AsyncWriteExt::close`](futures::io::AsyncWriteExt::close)
    /// on the returned writer to finalize the compressed stream.
    pub fn async_wrap_writer<'a, W: AsyncWrite + Unpin + Send + 'a>(&self, writer: W) -> BoxAsyncWrite<'a> {
        match self {
            Compression::None => Box::new(writer),
            #[cfg(feature = "brotli")]
            Compression::Brotli => Box::new(BrotliEncoder::with_quality(writer, Level::Best)),
            Compression::Bzip2 => Box::new(BzEncoder::with_quality(writer, Level::Best)),
            Compression::Gzip => Box::new(GzipEncoder::with_quality(writer, Level::Best)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzEncoder::with_quality(writer, Level::Best)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdEncoder::with_quality(writer, Level::Precise(22))),
        }
    }
}
