//! Physical side of the hoard: content hashing, staged writes, deletion
//! into a recycle bin, and resolving stored paths back to files.
//!
//! Every collaborator is a trait ([`Hasher`], [`StorageWriter`],
//! [`PathResolver`]) with one local-filesystem implementation, and an
//! in-memory double behind the `mock` feature.

pub mod error;
mod hash;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod path;
mod resolve;
mod writer;

pub use crate::hash::{Blake3Hasher, CHUNK_SIZE, ContentHash, Digest, Hasher};
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::{FixedHasher, MockStorage};
pub use crate::path::{anchor, to_stored, validate as validate_path};
pub use crate::resolve::{Checked, LocalResolver, PathResolver, Resolution, Step, candidates};
pub use crate::writer::{Deleted, LocalWriter, ORIGIN_FILE, StagedFile, StorageWriter};
use std::sync::Arc;

pub type HasherHandle = Arc<dyn Hasher + Send + Sync>;
pub type WriterHandle = Arc<dyn StorageWriter + Send + Sync>;
pub type ResolverHandle = Arc<dyn PathResolver + Send + Sync>;
