use crate::error::{Error, ErrorKind};
use crate::models::{from_nanos, to_nanos};
use exn::{OptionExt, ResultExt};
use hoard_compress::Compression;
use hoard_storage::ContentHash;
use std::collections::BTreeSet;
use std::path::PathBuf;
use time::UtcDateTime;
use uuid::Uuid;

/// Metadata pulled out of a photo at upload time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhotoMetadata {
    pub taken_at: Option<UtcDateTime>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
impl PhotoMetadata {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One physical file under management.
#[derive(Clone, Debug, PartialEq)]
pub struct FileRecord {
    pub id: Uuid,
    /// Stored path: relative to the storage root when the file lives under
    /// it, absolute otherwise. Carries the compression suffix.
    pub path: PathBuf,
    /// Original display name.
    pub name: String,
    /// Hash of the original, uncompressed content. Unique across records.
    pub hash: ContentHash,
    /// Size of the original, uncompressed content.
    pub size: u64,
    pub compression: Compression,
    pub mime_type: String,
    pub folder_id: Option<Uuid>,
    pub created_at: UtcDateTime,
    pub photo: Option<PhotoMetadata>,
    pub tags: BTreeSet<String>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub(crate) id: String,
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) hash: String,
    pub(crate) size: i64,
    pub(crate) compression: String,
    pub(crate) mime_type: String,
    pub(crate) folder_id: Option<String>,
    pub(crate) created_at: i64,
    pub(crate) taken_at: Option<i64>,
    pub(crate) camera_make: Option<String>,
    pub(crate) camera_model: Option<String>,
    pub(crate) latitude: Option<f64>,
    pub(crate) longitude: Option<f64>,
    pub(crate) tags: String,
}
impl TryFrom<&FileRecord> for FileRow {
    type Error = Error;
    fn try_from(file: &FileRecord) -> Result<Self, Self::Error> {
        let photo = file.photo.clone().unwrap_or_default();
        Ok(Self {
            id: file.id.to_string(),
            path: file.path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string(),
            name: file.name.clone(),
            hash: file.hash.to_string(),
            size: i64::try_from(file.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            compression: file.compression.to_string(),
            mime_type: file.mime_type.clone(),
            folder_id: file.folder_id.map(|id| id.to_string()),
            created_at: to_nanos(file.created_at, "file creation date")?,
            taken_at: photo.taken_at.map(|taken| to_nanos(taken, "date taken")).transpose()?,
            camera_make: photo.camera_make,
            camera_model: photo.camera_model,
            latitude: photo.latitude,
            longitude: photo.longitude,
            tags: serde_json::to_string(&file.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
        })
    }
}
impl TryFrom<FileRow> for FileRecord {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let photo = PhotoMetadata {
            taken_at: row.taken_at.map(|taken| from_nanos(taken, "date taken")).transpose()?,
            camera_make: row.camera_make,
            camera_model: row.camera_model,
            latitude: row.latitude,
            longitude: row.longitude,
        };
        Ok(Self {
            id: Uuid::parse_str(&row.id).or_raise(|| ErrorKind::InvalidData("file id"))?,
            path: PathBuf::from(row.path),
            name: row.name,
            hash: row.hash.parse::<ContentHash>().or_raise(|| ErrorKind::InvalidData("content hash"))?,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            compression: row
                .compression
                .parse::<Compression>()
                .or_raise(|| ErrorKind::InvalidData("compression format"))?,
            mime_type: row.mime_type,
            folder_id: row
                .folder_id
                .map(|id| Uuid::parse_str(&id))
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("folder id"))?,
            created_at: from_nanos(row.created_at, "file creation date")?,
            photo: (!photo.is_empty()).then_some(photo),
            tags: serde_json::from_str(&row.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
        })
    }
}
