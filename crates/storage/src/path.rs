//! Stored-path handling.
//!
//! Records keep a *stored path*: relative to the storage root when the file
//! lives under it, absolute otherwise. Relative stored paths survive moving
//! the whole storage root; absolute ones are kept for files that were placed
//! outside it.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Validate and normalize a path relative to the storage root.
///
/// `.` and empty components are dropped and `..` is resolved, but the path
/// may never climb above the root. NUL bytes and Windows drive prefixes are
/// rejected, as is anything that normalizes to nothing.
///
/// ```
/// use std::path::Path;
/// use hoard_storage::validate_path;
///
/// assert_eq!(validate_path("Default/2024/05/").unwrap(), Path::new("Default/2024/05"));
/// assert_eq!(validate_path("Default/../Holidays").unwrap(), Path::new("Holidays"));
/// assert!(validate_path("Default/../../etc").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut normalized = Vec::new();
    for component in original.components() {
        match component {
            // Path::components() lets NUL through on Unix; syscalls would
            // silently truncate at it.
            Component::Normal(part) if part.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(part) => normalized.push(part),
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if normalized.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if normalized.is_empty() {
        exn::bail!(invalid());
    }
    Ok(normalized.into_iter().collect())
}

/// The stored form of a physical path: relative to `root` when underneath
/// it, otherwise the physical path unchanged.
pub fn to_stored(root: &Path, physical: &Path) -> PathBuf {
    match physical.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
        _ => physical.to_path_buf(),
    }
}

/// The physical location a stored path points at when anchored to `root`.
pub fn anchor(root: &Path, stored: &Path) -> PathBuf {
    match stored.is_absolute() {
        true => stored.to_path_buf(),
        false => root.join(stored),
    }
}
