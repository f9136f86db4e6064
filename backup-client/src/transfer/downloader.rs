//! All-or-nothing download of a node's active backup version.

use super::join_all_settled;
use crate::error::{BackupError, Result};
use crate::folders::NodeTags;
use crate::store::{timed, FileRef, FolderRef, RemoteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Downloader {
    store: Arc<dyn RemoteStore>,
    call_timeout: Duration,
    max_concurrent: usize,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        call_timeout: Duration,
        max_concurrent: usize,
        cancel: CancellationToken,
    ) -> Self {
        Downloader {
            store,
            call_timeout,
            max_concurrent,
            cancel,
        }
    }

    /// Fetch every file of the node's active version into `dest_dir`.
    ///
    /// Returns the local paths in task-completion order, which need not
    /// match the remote listing order.
    pub async fn download_active_version(
        &self,
        node_folder: &FolderRef,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let tags = timed(
            self.call_timeout,
            "read node metadata",
            self.store.get_metadata(node_folder),
        )
        .await?;
        let version_id = NodeTags::from_tag_map(&tags)
            .active_version_id
            .ok_or(BackupError::NoBackupFound)?;

        let children = timed(
            self.call_timeout,
            "list version folders",
            self.store.list_children(node_folder),
        )
        .await?;
        let version_folder = children
            .iter()
            .find(|child| child.title == version_id)
            .and_then(|child| child.as_folder())
            .cloned()
            .ok_or(BackupError::NoBackupFound)?;

        let entries = timed(
            self.call_timeout,
            "list backup files",
            self.store.list_children(&version_folder),
        )
        .await?;
        let files: Vec<FileRef> = entries
            .iter()
            .filter_map(|entry| entry.as_file())
            .cloned()
            .collect();

        info!(%version_id, files = files.len(), "downloading active backup version");

        let total = files.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks: JoinSet<Result<PathBuf>> = JoinSet::new();
        for file in files {
            let store = Arc::clone(&self.store);
            let dest = dest_dir.to_path_buf();
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let call_timeout = self.call_timeout;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| BackupError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(BackupError::Cancelled);
                }
                tokio::select! {
                    result = timed(call_timeout, "download file", store.download_file(&file, &dest)) => result,
                    _ = cancel.cancelled() => Err(BackupError::Cancelled),
                }
            });
        }

        let settled = join_all_settled(tasks).await;
        if !settled.all_succeeded() {
            return Err(BackupError::PartialDownload {
                failed: settled.failed,
                total,
            });
        }
        Ok(settled.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::Account;
    use crate::transfer::VersionedUploader;

    async fn node_folder(store: &Arc<MemoryStore>) -> FolderRef {
        let account = Account {
            id: "test-account".into(),
        };
        let root = store.root_folder(&account).await.unwrap();
        store.create_folder(&root, "node1", true).await.unwrap()
    }

    fn downloader(store: &Arc<MemoryStore>) -> Downloader {
        Downloader::new(
            Arc::clone(store) as Arc<dyn RemoteStore>,
            Duration::from_secs(5),
            4,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_no_backup_found_on_fresh_node() {
        let store = Arc::new(MemoryStore::new());
        let folder = node_folder(&store).await;
        let dir = tempfile::tempdir().unwrap();

        let err = downloader(&store)
            .download_active_version(&folder, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::NoBackupFound));
    }

    #[tokio::test]
    async fn test_roundtrip_bytes_match() {
        let store = Arc::new(MemoryStore::new());
        let folder = node_folder(&store).await;

        let src = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (name, contents) in [("wallet.db", "wallet bytes"), ("channels.bak", "channel bytes")]
        {
            let path = src.path().join(name);
            tokio::fs::write(&path, contents).await.unwrap();
            paths.push(path);
        }

        VersionedUploader::new(
            Arc::clone(&store) as Arc<dyn RemoteStore>,
            Duration::from_secs(5),
            4,
            CancellationToken::new(),
        )
        .upload_version(&folder, &paths, "device-a")
        .await
        .unwrap();

        let dest = tempfile::tempdir().unwrap();
        let restored = downloader(&store)
            .download_active_version(&folder, dest.path())
            .await
            .unwrap();

        assert_eq!(restored.len(), 2);
        for path in &restored {
            let name = path.file_name().unwrap().to_string_lossy();
            let original = std::fs::read(src.path().join(name.as_ref())).unwrap();
            assert_eq!(std::fs::read(path).unwrap(), original);
        }
    }

    #[tokio::test]
    async fn test_dangling_pointer_reports_no_backup() {
        let store = Arc::new(MemoryStore::new());
        let folder = node_folder(&store).await;
        let dir = tempfile::tempdir().unwrap();

        // Pointer names a version folder that does not exist.
        let tags = NodeTags {
            active_backup_id: Some("device-a".into()),
            active_version_id: Some("missing-version".into()),
        };
        store.update_metadata(&folder, tags.into_changes()).await.unwrap();

        let err = downloader(&store)
            .download_active_version(&folder, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::NoBackupFound));
    }
}
