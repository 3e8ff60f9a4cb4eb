//! MIME type sniffing from magic bytes.

use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Reported when the content is not recognised.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";
// Enough for every matcher `infer` ships with.
const SNIFF_LENGTH: u64 = 8 * 1024;

/// Detect the MIME type of a file from its first bytes.
///
/// Never fails: unreadable or unrecognised content is reported as
/// [`FALLBACK_MIME_TYPE`].
pub async fn detect_mime_type(path: &Path) -> String {
    let mut head = Vec::new();
    let read = match File::open(path).await {
        Ok(file) => file.take(SNIFF_LENGTH).read_to_end(&mut head).await,
        Err(err) => Err(err),
    };
    if let Err(err) = read {
        debug!(path = %path.display(), error = %err, "could not read file head for type detection");
    }
    infer::get(&head).map_or(FALLBACK_MIME_TYPE, |kind| kind.mime_type()).to_string()
}
