//! In-memory test double for [`MetadataStore`].

use crate::error::{ErrorKind, Result};
use crate::models::{FileRecord, FolderRecord, child_path, validate_folder_name};
use crate::store::MetadataStore;
use async_trait::async_trait;
use exn::OptionExt;
use hoard_compress::Compression;
use hoard_storage::ContentHash;
use std::collections::HashMap;
use std::path::Path;
use time::UtcDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    folders: HashMap<Uuid, FolderRecord>,
    files: HashMap<Uuid, FileRecord>,
}
impl State {
    fn folder(&self, id: Uuid) -> Result<&FolderRecord> {
        self.folders.get(&id).ok_or_raise(|| ErrorKind::FolderNotFound(id))
    }

    fn path_taken(&self, path: &str, except: Option<Uuid>) -> bool {
        self.folders.values().any(|f| f.path == path && Some(f.id) != except)
    }

    fn is_descendant(&self, folder: Uuid, ancestor: Uuid) -> bool {
        let mut current = self.folders.get(&folder);
        while let Some(f) = current {
            if f.id == ancestor {
                return true;
            }
            current = f.parent_id.and_then(|id| self.folders.get(&id));
        }
        false
    }
}

/// Metadata store held entirely in memory, with the same uniqueness and
/// cycle rules as [`Repository`](crate::Repository).
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of file records held.
    pub async fn file_count(&self) -> usize {
        self.state.read().await.files.len()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get_folder(&self, id: Uuid) -> Result<Option<FolderRecord>> {
        Ok(self.state.read().await.folders.get(&id).cloned())
    }

    async fn get_folder_by_path(&self, path: &str) -> Result<Option<FolderRecord>> {
        Ok(self.state.read().await.folders.values().find(|f| f.path == path).cloned())
    }

    async fn add_folder(&self, name: &str, parent: Option<Uuid>) -> Result<FolderRecord> {
        validate_folder_name(name)?;
        let mut state = self.state.write().await;
        let parent = parent.map(|id| state.folder(id)).transpose()?;
        let folder = FolderRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            path: child_path(parent, name),
            parent_id: parent.map(|p| p.id),
            created_at: UtcDateTime::now(),
        };
        if state.path_taken(&folder.path, None) {
            exn::bail!(ErrorKind::FolderExists(folder.path));
        }
        state.folders.insert(folder.id, folder.clone());
        Ok(folder)
    }

    async fn update_folder(&self, id: Uuid, name: &str, parent: Option<Uuid>) -> Result<FolderRecord> {
        validate_folder_name(name)?;
        let mut state = self.state.write().await;
        let folder = state.folder(id)?.clone();
        if let Some(parent_id) = parent
            && state.is_descendant(parent_id, id)
        {
            exn::bail!(ErrorKind::Cycle);
        }
        let parent = parent.map(|id| state.folder(id)).transpose()?;
        let updated = FolderRecord {
            name: name.to_string(),
            path: child_path(parent, name),
            parent_id: parent.map(|p| p.id),
            ..folder.clone()
        };
        if state.path_taken(&updated.path, Some(id)) {
            exn::bail!(ErrorKind::FolderExists(updated.path));
        }
        let old_prefix = format!("{}/", folder.path);
        for other in state.folders.values_mut() {
            if let Some(rest) = other.path.strip_prefix(&old_prefix) {
                other.path = format!("{}/{rest}", updated.path);
            }
        }
        state.folders.insert(id, updated.clone());
        Ok(updated)
    }

    async fn list_folders_by_parent(&self, parent: Option<Uuid>) -> Result<Vec<FolderRecord>> {
        let state = self.state.read().await;
        let mut folders: Vec<_> = state.folders.values().filter(|f| f.parent_id == parent).cloned().collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    async fn is_descendant(&self, folder: Uuid, ancestor: Uuid) -> Result<bool> {
        Ok(self.state.read().await.is_descendant(folder, ancestor))
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>> {
        Ok(self.state.read().await.files.get(&id).cloned())
    }

    async fn get_file_by_hash(&self, hash: &ContentHash) -> Result<Option<FileRecord>> {
        Ok(self.state.read().await.files.values().find(|f| f.hash == *hash).cloned())
    }

    async fn add_file(&self, file: &FileRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.files.values().any(|f| f.hash == file.hash) {
            exn::bail!(ErrorKind::DuplicateHash(file.hash.to_string()));
        }
        state.files.insert(file.id, file.clone());
        Ok(())
    }

    async fn update_file_path(&self, id: Uuid, path: &Path, compression: Compression) -> Result<()> {
        let mut state = self.state.write().await;
        let file = state.files.get_mut(&id).ok_or_raise(|| ErrorKind::FileNotFound(id))?;
        file.path = path.to_path_buf();
        file.compression = compression;
        Ok(())
    }

    async fn list_files_by_folder(&self, folder: Option<Uuid>) -> Result<Vec<FileRecord>> {
        let state = self.state.read().await;
        let mut files: Vec<_> = state.files.values().filter(|f| f.folder_id == folder).cloned().collect();
        files.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_at.cmp(&b.created_at)));
        Ok(files)
    }

    async fn delete_file(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.write().await.files.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_record;

    #[tokio::test]
    async fn test_duplicate_hash() {
        let store = MemoryStore::new();
        store.add_file(&test_record("a.jpg", b"same")).await.unwrap();
        let err = store.add_file(&test_record("b.jpg", b"same")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::DuplicateHash(_)));
        assert_eq!(store.file_count().await, 1);
    }

    #[tokio::test]
    async fn test_move_rewrites_descendants() {
        let store = MemoryStore::new();
        let rome = store.get_or_create_folder_by_path("Photos/Trips/Rome").await.unwrap();
        let trips = store.get_folder_by_path("Photos/Trips").await.unwrap().unwrap();
        let photos = store.get_folder_by_path("Photos").await.unwrap().unwrap();

        let err = store.update_folder(photos.id, "Photos", Some(rome.id)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cycle));

        store.update_folder(trips.id, "Travel", None).await.unwrap();
        assert_eq!(store.get_folder(rome.id).await.unwrap().unwrap().path, "Travel/Rome");
        assert!(store.list_folders_by_parent(Some(photos.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sibling_conflict() {
        let store = MemoryStore::new();
        store.add_folder("A", None).await.unwrap();
        let b = store.add_folder("B", None).await.unwrap();
        let err = store.update_folder(b.id, "A", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::FolderExists(path) if path == "A"));
    }
}
