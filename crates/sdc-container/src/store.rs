//! Reference [`ContainerStore`] implementations.
//!
//! - [`MemoryStore`]: process-local map, for tests and embedding.
//! - [`DirStore`]: one exported `.sdc` file per container in a directory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdc_core::defaults::CONTAINER_EXTENSION;
use sdc_core::{ContainerStore, Error, Result, SdcFile};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::access;
use crate::codec;

fn check_expected(container: &SdcFile, expected_view_count: u32) -> Result<()> {
    let actual = container.metadata.access.view_count;
    if actual != expected_view_count {
        return Err(Error::Conflict(format!(
            "view_count is {}, expected {}",
            actual, expected_view_count
        )));
    }
    Ok(())
}

// =============================================================================
// MEMORY
// =============================================================================

/// In-memory container store.
#[derive(Default)]
pub struct MemoryStore {
    containers: RwLock<HashMap<Uuid, SdcFile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a stored container verbatim, bypassing all checks.
    ///
    /// Lets tests simulate tampering with data at rest.
    pub async fn overwrite(&self, container: SdcFile) {
        self.containers.write().await.insert(container.id, container);
    }
}

#[async_trait]
impl ContainerStore for MemoryStore {
    async fn insert(&self, container: &SdcFile) -> Result<()> {
        let mut containers = self.containers.write().await;
        if containers.contains_key(&container.id) {
            return Err(Error::Conflict(format!(
                "Container {} already exists",
                container.id
            )));
        }
        containers.insert(container.id, container.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<SdcFile> {
        self.containers
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    async fn record_view(
        &self,
        id: Uuid,
        expected_view_count: u32,
        now: DateTime<Utc>,
    ) -> Result<SdcFile> {
        let mut containers = self.containers.write().await;
        let current = containers.get(&id).ok_or(Error::NotFound(id))?;
        check_expected(current, expected_view_count)?;

        let updated = access::record_view(current, now);
        containers.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.containers
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::NotFound(id))
    }

    async fn list_ids(&self) -> Result<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self.containers.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// Directory-backed container store.
///
/// Files are written to a temporary name and renamed into place. Concurrent
/// `record_view` calls are serialized within this process only; two
/// processes sharing a directory can still race.
pub struct DirStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DirStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            Error::Storage(format!("Cannot create store at {}: {}", root.display(), e))
        })?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding container `id`.
    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{}.{}", id, CONTAINER_EXTENSION))
    }

    async fn read(&self, id: Uuid) -> Result<SdcFile> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => codec::decode(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path_for(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{}.{}.tmp", id, CONTAINER_EXTENSION))
    }

    async fn write(&self, container: &SdcFile) -> Result<()> {
        let bytes = codec::encode(container)?;
        let path = self.path_for(container.id);
        let tmp = self.temp_path_for(container.id);

        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            warn!(temp_path = %tmp.display(), error = %e, "dir_store: temp write failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            warn!(from = %tmp.display(), to = %path.display(), error = %e, "dir_store: rename failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerStore for DirStore {
    async fn insert(&self, container: &SdcFile) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(self.path_for(container.id)).await? {
            return Err(Error::Conflict(format!(
                "Container {} already exists",
                container.id
            )));
        }
        self.write(container).await
    }

    async fn fetch(&self, id: Uuid) -> Result<SdcFile> {
        self.read(id).await
    }

    async fn record_view(
        &self,
        id: Uuid,
        expected_view_count: u32,
        now: DateTime<Utc>,
    ) -> Result<SdcFile> {
        let _guard = self.write_lock.lock().await;
        let current = self.read(id).await?;
        check_expected(&current, expected_view_count)?;

        let updated = access::record_view(&current, now);
        self.write(&updated).await?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_ids(&self) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CONTAINER_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_container;
    use tempfile::tempdir;

    async fn exercise_store<S: ContainerStore>(store: &S) {
        let (container, _) = sample_container(b"stored payload");
        let id = container.id;

        store.insert(&container).await.unwrap();
        assert_eq!(store.fetch(id).await.unwrap(), container);
        assert_eq!(store.list_ids().await.unwrap(), vec![id]);

        let dup = store.insert(&container).await;
        assert!(matches!(dup, Err(Error::Conflict(_))));

        let now = Utc::now();
        let viewed = store.record_view(id, 0, now).await.unwrap();
        assert_eq!(viewed.metadata.access.view_count, 1);
        assert_eq!(viewed.last_modified, now);
        assert_eq!(store.fetch(id).await.unwrap(), viewed);

        let stale = store.record_view(id, 0, now).await;
        assert!(matches!(stale, Err(Error::Conflict(_))));
        assert_eq!(
            store.fetch(id).await.unwrap().metadata.access.view_count,
            1
        );

        store.delete(id).await.unwrap();
        assert!(matches!(store.fetch(id).await, Err(Error::NotFound(_))));
        assert!(matches!(store.delete(id).await, Err(Error::NotFound(_))));
        assert!(matches!(
            store.record_view(id, 1, now).await,
            Err(Error::NotFound(_))
        ));
        assert!(store.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        exercise_store(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_dir_store_contract() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path().join("containers")).await.unwrap();
        exercise_store(&store).await;
    }

    #[tokio::test]
    async fn test_dir_store_files_are_exported_form() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();
        let (container, _) = sample_container(b"on disk");

        store.insert(&container).await.unwrap();

        let bytes = std::fs::read(store.path_for(container.id)).unwrap();
        assert!(codec::looks_like_container(&bytes));
        assert_eq!(codec::decode(&bytes).unwrap(), container);
    }

    #[tokio::test]
    async fn test_dir_store_failed_rename_removes_temp_file() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();
        let (container, _) = sample_container(b"blocked");

        // A non-empty directory at the target path makes the rename fail.
        let target = store.path_for(container.id);
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupied"), b"x").unwrap();

        let result = store.write(&container).await;
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!store.temp_path_for(container.id).exists());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_dir_store_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("not-a-uuid.sdc"), b"hello").unwrap();

        assert!(store.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dir_store_list_sorted() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();

        let mut expected = Vec::new();
        for _ in 0..3 {
            let (container, _) = sample_container(b"x");
            expected.push(container.id);
            store.insert(&container).await.unwrap();
        }
        expected.sort();

        assert_eq!(store.list_ids().await.unwrap(), expected);
    }
}
