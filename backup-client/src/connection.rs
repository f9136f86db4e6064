//! Session lifecycle for the remote store.
//!
//! One authenticated connection per manager, created lazily. The slot is
//! guarded by an async mutex held across the sign-in, so concurrent
//! first-time callers all wait on the same attempt instead of starting
//! duplicate sign-ins.

use crate::error::{BackupError, Result};
use crate::store::{timed, Account, FolderRef, RemoteStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// An established session: the signed-in account plus the application's
/// root folder, resolved once at sign-in.
#[derive(Debug, Clone)]
pub struct Connection {
    pub account: Account,
    pub root: FolderRef,
}

pub struct ConnectionManager {
    store: Arc<dyn RemoteStore>,
    slot: Mutex<Option<Arc<Connection>>>,
    call_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(store: Arc<dyn RemoteStore>, call_timeout: Duration) -> Self {
        ConnectionManager {
            store,
            slot: Mutex::new(None),
            call_timeout,
        }
    }

    /// Return the cached connection, authenticating first if none exists.
    ///
    /// `interactive` permits the store to prompt the user; silent attempts
    /// must succeed on cached credentials alone.
    pub async fn ensure(&self, interactive: bool) -> Result<Arc<Connection>> {
        let mut slot = self.slot.lock().await;
        if let Some(connection) = slot.as_ref() {
            debug!("reusing cached remote store session");
            return Ok(Arc::clone(connection));
        }

        let account = timed(
            self.call_timeout,
            "authenticate",
            self.store.authenticate(interactive),
        )
        .await
        .map_err(|err| match err {
            BackupError::Store(source) => BackupError::SignInFailed { source },
            other => other,
        })?;

        let root = timed(
            self.call_timeout,
            "resolve root folder",
            self.store.root_folder(&account),
        )
        .await?;

        info!(account = %account.id, "remote store session established");
        let connection = Arc::new(Connection { account, root });
        *slot = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// The cached connection, if one exists. Never triggers sign-in.
    pub async fn current(&self) -> Option<Arc<Connection>> {
        self.slot.lock().await.clone()
    }

    /// Drop the cached connection; the next [`ensure`](Self::ensure)
    /// re-authenticates.
    pub async fn teardown(&self) {
        let mut slot = self.slot.lock().await;
        if slot.take().is_some() {
            info!("remote store session cleared");
        }
    }
}
