mod file;
mod folder;

pub use self::file::{FileRecord, PhotoMetadata};
pub(crate) use self::file::FileRow;
#[cfg(test)]
pub(crate) use self::file::tests::record as test_record;
pub(crate) use self::folder::{FolderRow, child_path};
pub use self::folder::{FolderRecord, MAX_NAME_LENGTH, validate_folder_name};

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;

// Timestamps are stored as nanoseconds since the Unix epoch so that a record
// reads back exactly as it was written. An i64 covers dates up to 2262.
pub(crate) fn to_nanos(at: UtcDateTime, field: &'static str) -> Result<i64> {
    i64::try_from(at.unix_timestamp_nanos()).or_raise(|| ErrorKind::InvalidData(field))
}

pub(crate) fn from_nanos(nanos: i64, field: &'static str) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp_nanos(i128::from(nanos)).or_raise(|| ErrorKind::InvalidData(field))
}
