//! Optimistic ownership check on the node folder's backup ID tag.
//!
//! This is the protocol's sole concurrency-safety mechanism. It is
//! check-then-act, not a lock: callers run the check before any mutating
//! operation that could race with another device, and a mismatch surfaces
//! as a typed conflict the host can put in front of the user.

use crate::error::{BackupError, Result};
use crate::folders::{NodeTags, BACKUP_ID_TAG};
use crate::store::{timed, FolderRef, RemoteStore, TagMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct ConflictGuard {
    store: Arc<dyn RemoteStore>,
    call_timeout: Duration,
}

impl ConflictGuard {
    pub fn new(store: Arc<dyn RemoteStore>, call_timeout: Duration) -> Self {
        ConflictGuard {
            store,
            call_timeout,
        }
    }

    /// Succeeds when the folder carries no backup ID or the same one.
    pub async fn check_no_conflict(
        &self,
        node_folder: &FolderRef,
        requested_backup_id: &str,
    ) -> Result<()> {
        let tags = timed(
            self.call_timeout,
            "read node metadata",
            self.store.get_metadata(node_folder),
        )
        .await?;

        let node = NodeTags::from_tag_map(&tags);
        if let Some(existing) = node.active_backup_id {
            if existing != requested_backup_id {
                warn!(
                    %existing,
                    requested = requested_backup_id,
                    "backup ID conflict on node folder"
                );
                return Err(BackupError::Conflict {
                    existing,
                    requested: requested_backup_id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Unconditionally record `backup_id` as the folder's owner.
    pub async fn mark_backup_id(&self, node_folder: &FolderRef, backup_id: &str) -> Result<()> {
        let mut changes = TagMap::new();
        changes.insert(BACKUP_ID_TAG.to_string(), backup_id.to_string());
        timed(
            self.call_timeout,
            "mark backup ID",
            self.store.update_metadata(node_folder, changes),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::Account;

    async fn node_folder(store: &Arc<MemoryStore>) -> FolderRef {
        let account = Account {
            id: "test-account".into(),
        };
        let root = store.root_folder(&account).await.unwrap();
        store.create_folder(&root, "node1", true).await.unwrap()
    }

    fn guard(store: &Arc<MemoryStore>) -> ConflictGuard {
        ConflictGuard::new(
            Arc::clone(store) as Arc<dyn RemoteStore>,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_untagged_folder_is_safe_for_any_id() {
        let store = Arc::new(MemoryStore::new());
        let folder = node_folder(&store).await;
        let guard = guard(&store);

        guard.check_no_conflict(&folder, "anything").await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_then_check() {
        let store = Arc::new(MemoryStore::new());
        let folder = node_folder(&store).await;
        let guard = guard(&store);

        guard.mark_backup_id(&folder, "device-a").await.unwrap();
        guard.check_no_conflict(&folder, "device-a").await.unwrap();

        let err = guard
            .check_no_conflict(&folder, "device-b")
            .await
            .unwrap_err();
        match err {
            BackupError::Conflict {
                existing,
                requested,
            } => {
                assert_eq!(existing, "device-a");
                assert_eq!(requested, "device-b");
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mark_overwrites_previous_owner() {
        let store = Arc::new(MemoryStore::new());
        let folder = node_folder(&store).await;
        let guard = guard(&store);

        guard.mark_backup_id(&folder, "device-a").await.unwrap();
        guard.mark_backup_id(&folder, "device-b").await.unwrap();
        guard.check_no_conflict(&folder, "device-b").await.unwrap();
        assert!(guard.check_no_conflict(&folder, "device-a").await.is_err());
    }
}
