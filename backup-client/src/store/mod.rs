//! Remote object-store boundary.
//!
//! The protocol only needs folder/file CRUD, metadata tags, and a
//! best-effort sync trigger; everything provider-specific lives behind
//! [`RemoteStore`]. [`memory::MemoryStore`] implements the trait for tests.

pub mod memory;

use crate::error::{BackupError, Result, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Authenticated account handle returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
}

/// Opaque reference to a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderRef(pub String);

/// Opaque reference to a remote file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef(pub String);

/// Untyped key/value tags attached to a remote folder.
pub type TagMap = HashMap<String, String>;

/// A folder child, as returned by [`RemoteStore::list_children`].
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub title: String,
    pub resource: ChildRef,
}

#[derive(Debug, Clone)]
pub enum ChildRef {
    Folder(FolderRef),
    File(FileRef),
}

impl ChildEntry {
    pub fn as_folder(&self) -> Option<&FolderRef> {
        match &self.resource {
            ChildRef::Folder(folder) => Some(folder),
            ChildRef::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileRef> {
        match &self.resource {
            ChildRef::File(file) => Some(file),
            ChildRef::Folder(_) => None,
        }
    }
}

/// Folder-oriented remote object store.
///
/// All calls are suspension points; none are retried here. Callers wrap
/// each call in the crate's per-call timeout so a stalled remote never
/// blocks an operation indefinitely.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Establish a signed-in account. `interactive` permits prompting the
    /// user; a silent attempt must succeed on cached credentials alone.
    async fn authenticate(&self, interactive: bool) -> std::result::Result<Account, StoreError>;

    /// Revoke whatever session the provider holds, cached credentials
    /// included. Must succeed even when no session was ever established.
    async fn revoke(&self) -> std::result::Result<(), StoreError>;

    /// The application's root folder for this account.
    async fn root_folder(&self, account: &Account) -> std::result::Result<FolderRef, StoreError>;

    async fn list_children(
        &self,
        folder: &FolderRef,
    ) -> std::result::Result<Vec<ChildEntry>, StoreError>;

    /// Create a child folder. `pinned` asks the store to keep the folder
    /// out of storage-saving eviction.
    async fn create_folder(
        &self,
        parent: &FolderRef,
        title: &str,
        pinned: bool,
    ) -> std::result::Result<FolderRef, StoreError>;

    async fn get_metadata(&self, folder: &FolderRef) -> std::result::Result<TagMap, StoreError>;

    /// Apply tag changes in a single metadata write.
    async fn update_metadata(
        &self,
        folder: &FolderRef,
        changes: TagMap,
    ) -> std::result::Result<(), StoreError>;

    async fn upload_file(
        &self,
        folder: &FolderRef,
        local_path: &Path,
    ) -> std::result::Result<FileRef, StoreError>;

    /// Download a file into `dest_dir`, returning the local path written.
    async fn download_file(
        &self,
        file: &FileRef,
        dest_dir: &Path,
    ) -> std::result::Result<PathBuf, StoreError>;

    async fn delete_folder(&self, folder: &FolderRef) -> std::result::Result<(), StoreError>;

    /// Ask the store to refresh its view of remote changes. Best-effort.
    async fn request_sync(&self, account: &Account) -> std::result::Result<(), StoreError>;
}

/// Wrap a remote store call with the configured per-call timeout.
pub(crate) async fn timed<T, F>(timeout: Duration, op: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(BackupError::from),
        Err(_) => Err(BackupError::Timeout { op }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timed_elapses() {
        let result: Result<()> = timed(Duration::from_secs(1), "stalled call", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(BackupError::Timeout { op }) => assert_eq!(op, "stalled call"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timed_passes_through() {
        let result = timed(Duration::from_secs(1), "quick call", async {
            Ok::<_, StoreError>(7)
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
    }
}
