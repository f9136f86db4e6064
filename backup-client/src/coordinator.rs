//! Public operations of the backup protocol.
//!
//! Every operation first ensures a connection, then resolves the node
//! folder, then performs the versioned read or write. The coordinator owns
//! one connection slot, one sync throttle, and one cancellation token
//! shared by all transfer fan-outs.

use crate::config::Config;
use crate::conflict::ConflictGuard;
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::folders::FolderResolver;
use crate::store::{timed, FolderRef, RemoteStore};
use crate::throttle::SyncThrottler;
use crate::transfer::{Downloader, VersionedUploader};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct BackupCoordinator {
    store: Arc<dyn RemoteStore>,
    connection: ConnectionManager,
    throttle: SyncThrottler,
    resolver: FolderResolver,
    guard: ConflictGuard,
    uploader: VersionedUploader,
    downloader: Downloader,
    restore_dir: PathBuf,
    call_timeout: std::time::Duration,
    cancel: CancellationToken,
}

impl BackupCoordinator {
    pub fn new(store: Arc<dyn RemoteStore>, config: &Config) -> Self {
        let call_timeout = config.remote_call_timeout();
        let cancel = CancellationToken::new();
        BackupCoordinator {
            connection: ConnectionManager::new(Arc::clone(&store), call_timeout),
            throttle: SyncThrottler::new(Arc::clone(&store), config.sync_window(), call_timeout),
            resolver: FolderResolver::new(Arc::clone(&store), call_timeout),
            guard: ConflictGuard::new(Arc::clone(&store), call_timeout),
            uploader: VersionedUploader::new(
                Arc::clone(&store),
                call_timeout,
                config.max_concurrent_transfers,
                cancel.clone(),
            ),
            downloader: Downloader::new(
                Arc::clone(&store),
                call_timeout,
                config.max_concurrent_transfers,
                cancel.clone(),
            ),
            restore_dir: config.restore_dir.clone(),
            call_timeout,
            cancel,
            store,
        }
    }

    /// Token cancelling all in-flight upload/download fan-outs. One-shot:
    /// a cancelled coordinator should be replaced, not reused.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Upload `paths` as the node's new active backup version.
    pub async fn backup(
        &self,
        node_id: &str,
        backup_id: &str,
        paths: &[PathBuf],
        interactive: bool,
    ) -> Result<()> {
        info!(node_id, backup_id, files = paths.len(), "backup requested");
        let connection = self.connection.ensure(interactive).await?;
        let node_folder = self
            .resolver
            .get_or_create_node_folder(&connection, node_id)
            .await?;
        self.uploader
            .upload_version(&node_folder, paths, backup_id)
            .await
    }

    /// Download the node's active backup version into the restore dir.
    ///
    /// Marks `backup_id` as the node's owner before reading, deliberately
    /// claiming the lineage for the restoring device. A backup from
    /// another device racing this restore is an accepted trade-off.
    pub async fn restore(
        &self,
        node_id: &str,
        backup_id: &str,
        interactive: bool,
    ) -> Result<Vec<PathBuf>> {
        info!(node_id, backup_id, "restore requested");
        let connection = self.connection.ensure(interactive).await?;
        let node_folder = self
            .resolver
            .get_or_create_node_folder(&connection, node_id)
            .await?;
        self.guard.mark_backup_id(&node_folder, backup_id).await?;
        tokio::fs::create_dir_all(&self.restore_dir).await?;
        self.downloader
            .download_active_version(&node_folder, &self.restore_dir)
            .await
    }

    /// All node folders present in the remote store, keyed by node ID.
    pub async fn list_available(&self, interactive: bool) -> Result<HashMap<String, FolderRef>> {
        let connection = self.connection.ensure(interactive).await?;
        self.resolver.list_node_folders(&connection).await
    }

    /// Check whether `backup_id` may take over the node without clobbering
    /// another device's lineage. Requests a remote sync first (throttled,
    /// best-effort) so the check sees reasonably fresh state.
    pub async fn check_safe(
        &self,
        node_id: &str,
        backup_id: &str,
        interactive: bool,
    ) -> Result<()> {
        let connection = self.connection.ensure(interactive).await?;
        self.throttle.maybe_sync(&connection).await;
        let node_folder = self
            .resolver
            .get_or_create_node_folder(&connection, node_id)
            .await?;
        self.guard.check_no_conflict(&node_folder, backup_id).await
    }

    /// Revoke the session and clear the cached connection; the next
    /// operation re-authenticates from scratch.
    ///
    /// Revocation runs even without a cached connection, so sign-out
    /// after a failed sign-in still clears provider-side state.
    pub async fn sign_out(&self) -> Result<()> {
        timed(self.call_timeout, "revoke session", self.store.revoke()).await?;
        self.connection.teardown().await;
        info!("signed out of remote store");
        Ok(())
    }
}
