//! Versioned atomic upload.
//!
//! A backup snapshot is written as a fresh version folder under the node
//! folder. The node's active-version pointer is switched only after every
//! file is confirmed uploaded, and the previous version is pruned only
//! after the switch succeeds, so a valid active version exists at every
//! observable instant. A crash or partial failure leaves orphan folders
//! behind as accepted garbage; it never corrupts the active pointer.

use super::{join_all_settled, Settled};
use crate::error::{BackupError, Result};
use crate::folders::{NodeTags, CREATED_AT_TAG};
use crate::store::{timed, FileRef, FolderRef, RemoteStore, TagMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

pub struct VersionedUploader {
    store: Arc<dyn RemoteStore>,
    call_timeout: Duration,
    max_concurrent: usize,
    cancel: CancellationToken,
}

impl VersionedUploader {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        call_timeout: Duration,
        max_concurrent: usize,
        cancel: CancellationToken,
    ) -> Self {
        VersionedUploader {
            store,
            call_timeout,
            max_concurrent,
            cancel,
        }
    }

    /// Upload `paths` as a new backup version and commit it as active.
    ///
    /// On partial failure the new version folder and its contents are left
    /// behind and the node's pointer is not touched.
    pub async fn upload_version(
        &self,
        node_folder: &FolderRef,
        paths: &[PathBuf],
        backup_id: &str,
    ) -> Result<()> {
        let version_id = Uuid::new_v4().to_string();
        let version_folder = timed(
            self.call_timeout,
            "create version folder",
            self.store.create_folder(node_folder, &version_id, false),
        )
        .await?;

        let mut created = TagMap::new();
        created.insert(
            CREATED_AT_TAG.to_string(),
            chrono::Utc::now().to_rfc3339(),
        );
        timed(
            self.call_timeout,
            "tag version folder",
            self.store.update_metadata(&version_folder, created),
        )
        .await?;

        info!(%version_id, files = paths.len(), "uploading backup version");

        let settled = self.upload_all(&version_folder, paths).await;
        if !settled.all_succeeded() {
            warn!(
                failed = settled.failed,
                total = settled.total,
                %version_id,
                "upload fan-out incomplete, leaving version uncommitted"
            );
            return Err(BackupError::PartialUpload {
                failed: settled.failed,
                total: settled.total,
            });
        }

        // One metadata write commits the new version and the owning
        // backup ID together.
        let commit = NodeTags {
            active_backup_id: Some(backup_id.to_string()),
            active_version_id: Some(version_id.clone()),
        };
        timed(
            self.call_timeout,
            "commit version pointer",
            self.store.update_metadata(node_folder, commit.into_changes()),
        )
        .await?;
        info!(%version_id, "backup version committed");

        self.prune_stale_versions(node_folder, &version_id).await;
        Ok(())
    }

    /// Fan out one upload task per file and wait for all of them.
    async fn upload_all(&self, version_folder: &FolderRef, paths: &[PathBuf]) -> Settled<FileRef> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks: JoinSet<Result<FileRef>> = JoinSet::new();

        for path in paths {
            let store = Arc::clone(&self.store);
            let folder = version_folder.clone();
            let path = path.clone();
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
                    result = timed(call_timeout, "upload file", store.upload_file(&folder, &path)) => result,
                    _ = cancel.cancelled() => Err(BackupError::Cancelled),
                }
            });
        }

        join_all_settled(tasks).await
    }

    /// Delete every version folder except the newly active one. Failures
    /// never roll back the pointer switch; leftovers are garbage a later
    /// backup prunes again.
    async fn prune_stale_versions(&self, node_folder: &FolderRef, active_version_id: &str) {
        let children = match timed(
            self.call_timeout,
            "list version folders",
            self.store.list_children(node_folder),
        )
        .await
        {
            Ok(children) => children,
            Err(err) => {
                warn!("could not list stale versions for pruning: {err}");
                return;
            }
        };

        for child in children {
            if child.title == active_version_id {
                continue;
            }
            let Some(folder) = child.as_folder() else {
                continue;
            };
            match timed(
                self.call_timeout,
                "delete stale version",
                self.store.delete_folder(folder),
            )
            .await
            {
                Ok(()) => info!(version_id = %child.title, "pruned stale backup version"),
                Err(err) => warn!(version_id = %child.title, "failed to prune stale version: {err}"),
            }
        }
    }
}
