//! Rate limiting for explicit remote sync requests.
//!
//! The sync trigger is a freshness hint, not a correctness requirement:
//! failures are logged and swallowed, and the timestamp only advances on
//! success so a failed trigger does not suppress the next attempt.

use crate::connection::Connection;
use crate::store::RemoteStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct SyncThrottler {
    store: Arc<dyn RemoteStore>,
    window: Duration,
    call_timeout: Duration,
    last_sync: Mutex<Option<Instant>>,
}

impl SyncThrottler {
    pub fn new(store: Arc<dyn RemoteStore>, window: Duration, call_timeout: Duration) -> Self {
        SyncThrottler {
            store,
            window,
            call_timeout,
            last_sync: Mutex::new(None),
        }
    }

    /// Trigger a remote sync unless one was triggered within the window.
    pub async fn maybe_sync(&self, connection: &Connection) {
        // The lock is held across the remote call so overlapping callers
        // cannot both observe a stale timestamp.
        let mut last_sync = self.last_sync.lock().await;

        let start = Instant::now();
        if let Some(previous) = *last_sync {
            if start.duration_since(previous) <= self.window {
                debug!("sync request suppressed by throttle window");
                return;
            }
        }

        let request = self.store.request_sync(&connection.account);
        match tokio::time::timeout(self.call_timeout, request).await {
            Ok(Ok(())) => {
                let done = Instant::now();
                *last_sync = Some(done);
                info!("remote sync requested, took {:?}", done.duration_since(start));
            }
            Ok(Err(err)) => warn!("sync request failed (ignored): {err}"),
            Err(_) => warn!("sync request timed out (ignored)"),
        }
    }
}
