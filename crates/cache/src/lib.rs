//! SQLite metadata store for the hoard library.
//!
//! Tracks the logical folder tree and one [`FileRecord`] per unique piece of
//! content. The physical files under the storage root remain the data; this
//! database records where each one lives, what it hashes to, and what was
//! learned about it at upload time.
//!
//! # Architecture
//! - **Folders** form a tree keyed by UUID. Each folder's `path` is the
//!   slash-joined chain of names from the top, which doubles as its
//!   directory relative to the storage root.
//! - **FileRecords** are keyed by UUID and carry a unique BLAKE3 content
//!   hash. The uniqueness constraint is the last line of deduplication when
//!   several processes upload the same content at once.

mod db;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod memory;
mod models;
mod repo;
mod store;

pub use crate::db::Database;
#[cfg(any(test, feature = "mock"))]
pub use crate::memory::MemoryStore;
pub use crate::models::{FileRecord, FolderRecord, MAX_NAME_LENGTH, PhotoMetadata, validate_folder_name};
pub use crate::repo::Repository;
pub use crate::store::{MetadataStore, StoreHandle};
