//! Content-hash deduplication.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use hoard_cache::{FileRecord, StoreHandle};
use hoard_storage::ContentHash;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub type DedupHandle = Arc<dyn DedupResolver + Send + Sync>;

/// Finds an already-stored file with identical content.
///
/// Matching is by exact content hash only; names and paths play no part.
#[async_trait]
pub trait DedupResolver: Send + Sync {
    async fn resolve(&self, hash: &ContentHash) -> Result<Option<FileRecord>>;
}

/// Looks hashes up in the metadata store.
pub struct StoreDedup {
    store: StoreHandle,
}
impl StoreDedup {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}
#[async_trait]
impl DedupResolver for StoreDedup {
    async fn resolve(&self, hash: &ContentHash) -> Result<Option<FileRecord>> {
        self.store.get_file_by_hash(hash).await.or_raise(|| ErrorKind::Cache)
    }
}

/// Preset answers, regardless of what the store holds.
#[cfg(test)]
#[derive(Default)]
pub struct StaticDedup {
    records: HashMap<ContentHash, FileRecord>,
}
#[cfg(test)]
impl StaticDedup {
    pub fn with_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        Self { records: records.into_iter().map(|record| (record.hash, record)).collect() }
    }
}
#[cfg(test)]
#[async_trait]
impl DedupResolver for StaticDedup {
    async fn resolve(&self, hash: &ContentHash) -> Result<Option<FileRecord>> {
        Ok(self.records.get(hash).cloned())
    }
}

/// One async mutex per content hash, so that identical uploads in this
/// process run their check-then-write one at a time.
///
/// Entries are dropped once nobody holds or waits on them.
#[derive(Default)]
pub struct HashLocks {
    locks: Mutex<HashMap<ContentHash, Weak<AsyncMutex<()>>>>,
}
impl HashLocks {
    pub async fn lock(&self, hash: ContentHash) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| lock.strong_count() > 0);
            match locks.get(&hash).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(hash, Arc::downgrade(&lock));
                    lock
                },
            }
        };
        lock.lock_owned().await
    }

    /// Number of hashes currently locked or waited on.
    pub fn len(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_cache::{MemoryStore, MetadataStore};
    use hoard_compress::Compression;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::time::Duration;
    use time::UtcDateTime;
    use uuid::Uuid;

    fn record(content: &[u8]) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            path: PathBuf::from("Default/a.txt"),
            name: "a.txt".to_string(),
            hash: ContentHash::of(content),
            size: content.len() as u64,
            compression: Compression::None,
            mime_type: "text/plain".to_string(),
            folder_id: None,
            created_at: UtcDateTime::now(),
            photo: None,
            tags: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn test_store_dedup_matches_by_hash_only() {
        let store = Arc::new(MemoryStore::new());
        let existing = record(b"hello");
        store.add_file(&existing).await.unwrap();
        let dedup = StoreDedup::new(store);
        assert_eq!(dedup.resolve(&ContentHash::of(b"hello")).await.unwrap(), Some(existing));
        assert_eq!(dedup.resolve(&ContentHash::of(b"hello!")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_static_dedup() {
        let existing = record(b"bytes");
        let dedup = StaticDedup::with_records([existing.clone()]);
        assert_eq!(dedup.resolve(&existing.hash).await.unwrap(), Some(existing));
    }

    #[tokio::test]
    async fn test_same_hash_is_serialized() {
        let locks = Arc::new(HashLocks::default());
        let hash = ContentHash::of(b"x");
        let guard = locks.lock(hash).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { drop(locks.lock(hash).await) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_hashes_do_not_block() {
        let locks = HashLocks::default();
        let _a = locks.lock(ContentHash::of(b"a")).await;
        let _b = locks.lock(ContentHash::of(b"b")).await;
        assert_eq!(locks.len(), 2);
    }
}
