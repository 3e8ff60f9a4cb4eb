use crate::error::{Error, ErrorKind, Result};
use crate::models::{from_nanos, to_nanos};
use exn::ResultExt;
use time::UtcDateTime;
use uuid::Uuid;

/// Longest folder name accepted, in bytes (the common filesystem limit).
pub const MAX_NAME_LENGTH: usize = 255;

/// A folder in the logical tree.
///
/// `path` is the slash-joined chain of names from the root, which is also
/// the folder's physical directory relative to the storage root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderRecord {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub parent_id: Option<Uuid>,
    pub created_at: UtcDateTime,
}

/// Reject names that could not double as a single directory name.
///
/// ```
/// use hoard_cache::validate_folder_name;
///
/// assert!(validate_folder_name("Holidays 2024").is_ok());
/// assert!(validate_folder_name("a/b").is_err());
/// assert!(validate_folder_name("..").is_err());
/// ```
pub fn validate_folder_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name != "."
        && name != ".."
        && name.trim() == name
        && !name.chars().any(|c| c == '/' || c == '\\' || c.is_control());
    match valid {
        true => Ok(()),
        false => exn::bail!(ErrorKind::InvalidName(name.to_string())),
    }
}

/// Path of a folder called `name` beneath `parent`.
pub(crate) fn child_path(parent: Option<&FolderRecord>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{}/{name}", parent.path),
        None => name.to_string(),
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FolderRow {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) parent_id: Option<String>,
    pub(crate) created_at: i64,
}
impl TryFrom<&FolderRecord> for FolderRow {
    type Error = Error;
    fn try_from(folder: &FolderRecord) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: folder.id.to_string(),
            name: folder.name.clone(),
            path: folder.path.clone(),
            parent_id: folder.parent_id.map(|id| id.to_string()),
            created_at: to_nanos(folder.created_at, "folder creation date")?,
        })
    }
}
impl TryFrom<FolderRow> for FolderRecord {
    type Error = Error;
    fn try_from(row: FolderRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).or_raise(|| ErrorKind::InvalidData("folder id"))?,
            name: row.name,
            path: row.path,
            parent_id: row
                .parent_id
                .map(|id| Uuid::parse_str(&id))
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("parent folder id"))?,
            created_at: from_nanos(row.created_at, "folder creation date")?,
        })
    }
}
