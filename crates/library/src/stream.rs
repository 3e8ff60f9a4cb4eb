use crate::error::Result;
use crate::upload::UploadResult;
use crate::{Library, MAX_UPLOAD_CONCURRENCY};
use async_stream::stream;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Progress events emitted by [`upload_all`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once, with the
///    number of sources.
/// 3. [`Uploaded`](Self::Uploaded), once per successful source, in
///    completion order. Failed sources are yielded as `Err` items instead.
/// 4. [`Complete`](Self::Complete), exactly once.
#[derive(Debug)]
pub enum UploadEvent {
    Started,
    DiscoveryComplete(u64),
    Uploaded(UploadResult),
    Complete,
}

/// Upload every source into `folder`, `MAX_UPLOAD_CONCURRENCY` at a time.
///
/// A failing source never ends the stream; its error is yielded in place of
/// an [`Uploaded`](UploadEvent::Uploaded) event. Once `cancel` fires, every
/// unfinished source fails with [`Cancelled`](crate::error::ErrorKind::Cancelled).
pub fn upload_all<'a>(
    library: &'a Library,
    sources: Vec<PathBuf>,
    folder: Option<Uuid>,
    organize_by_date: bool,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<UploadEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(UploadEvent::Started);
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(UploadEvent::DiscoveryComplete(u64::try_from(sources.len()).unwrap_or(0)));

        let mut pending = sources.into_iter();
        let mut processing = FuturesUnordered::new();
        processing.extend(
            pending.by_ref().take(MAX_UPLOAD_CONCURRENCY).map(|source| upload_one(library, source, folder, organize_by_date, cancel)),
        );
        while let Some(result) = processing.next().await {
            yield result.map(UploadEvent::Uploaded);
            if let Some(source) = pending.next() {
                processing.push(upload_one(library, source, folder, organize_by_date, cancel));
            }
        }

        yield Ok(UploadEvent::Complete);
    })
}

async fn upload_one(
    library: &Library,
    source: PathBuf,
    folder: Option<Uuid>,
    organize_by_date: bool,
    cancel: &CancellationToken,
) -> Result<UploadResult> {
    library.upload(&source, folder, organize_by_date, cancel).await
}
