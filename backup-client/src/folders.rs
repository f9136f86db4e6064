//! Node folder resolution and the typed view of node folder tags.
//!
//! Each wallet node owns one remote folder titled by its node ID, directly
//! under the store root. The folder carries two tags: the backup ID that
//! currently owns the node's backup lineage, and the name of the active
//! version folder. [`NodeTags`] is the only place the untyped tag map is
//! converted to and from typed state.

use crate::connection::Connection;
use crate::error::Result;
use crate::store::{timed, FolderRef, RemoteStore, TagMap};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Tag key recording the owning backup ID.
pub const BACKUP_ID_TAG: &str = "backupID";

/// Tag key naming the active version folder.
pub const ACTIVE_VERSION_TAG: &str = "activeVersionID";

/// Tag key recording when a version folder was created (RFC3339).
pub const CREATED_AT_TAG: &str = "createdAt";

/// Typed view of a node folder's tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTags {
    pub active_backup_id: Option<String>,
    pub active_version_id: Option<String>,
}

impl NodeTags {
    pub fn from_tag_map(tags: &TagMap) -> Self {
        NodeTags {
            active_backup_id: tags.get(BACKUP_ID_TAG).cloned(),
            active_version_id: tags.get(ACTIVE_VERSION_TAG).cloned(),
        }
    }

    /// Tag changes for the fields that are set; `None` fields are left
    /// untouched on the remote folder.
    pub fn into_changes(self) -> TagMap {
        let mut changes = TagMap::new();
        if let Some(backup_id) = self.active_backup_id {
            changes.insert(BACKUP_ID_TAG.to_string(), backup_id);
        }
        if let Some(version_id) = self.active_version_id {
            changes.insert(ACTIVE_VERSION_TAG.to_string(), version_id);
        }
        changes
    }
}

pub struct FolderResolver {
    store: Arc<dyn RemoteStore>,
    call_timeout: Duration,
}

impl FolderResolver {
    pub fn new(store: Arc<dyn RemoteStore>, call_timeout: Duration) -> Self {
        FolderResolver {
            store,
            call_timeout,
        }
    }

    /// Look up the node's folder by exact title under the root, creating
    /// it (pinned) when absent.
    pub async fn get_or_create_node_folder(
        &self,
        connection: &Connection,
        node_id: &str,
    ) -> Result<FolderRef> {
        let children = timed(
            self.call_timeout,
            "list node folders",
            self.store.list_children(&connection.root),
        )
        .await?;

        for child in &children {
            if child.title == node_id {
                if let Some(folder) = child.as_folder() {
                    return Ok(folder.clone());
                }
            }
        }

        info!(node_id, "creating remote folder for node");
        timed(
            self.call_timeout,
            "create node folder",
            self.store.create_folder(&connection.root, node_id, true),
        )
        .await
    }

    /// All node folders under the root, keyed by node ID.
    pub async fn list_node_folders(
        &self,
        connection: &Connection,
    ) -> Result<HashMap<String, FolderRef>> {
        let children = timed(
            self.call_timeout,
            "list node folders",
            self.store.list_children(&connection.root),
        )
        .await?;

        let mut folders = HashMap::new();
        for child in children {
            if let Some(folder) = child.as_folder() {
                folders.insert(child.title.clone(), folder.clone());
            }
        }
        Ok(folders)
    }
}
