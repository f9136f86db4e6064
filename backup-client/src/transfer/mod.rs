//! Fan-out machinery shared by upload and download.
//!
//! A transfer set is a batch of per-file tasks spawned onto the runtime,
//! bounded by a semaphore and joined with a wait-for-all barrier: the
//! batch is not resolved until every task reaches a terminal state, even
//! if one fails early. Failures are counted, never short-circuited, so a
//! partial batch can be rejected as a unit.

pub mod downloader;
pub mod uploader;

pub use downloader::Downloader;
pub use uploader::VersionedUploader;

use crate::error::Result;
use tokio::task::JoinSet;
use tracing::warn;

/// Outcome of a fully settled transfer batch.
pub(crate) struct Settled<T> {
    /// Successful results, in task-completion order.
    pub completed: Vec<T>,
    pub failed: usize,
    pub total: usize,
}

impl<T> Settled<T> {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.completed.len() == self.total
    }
}

/// Wait for every task in the set to finish and collect the outcomes.
pub(crate) async fn join_all_settled<T: 'static>(mut tasks: JoinSet<Result<T>>) -> Settled<T> {
    let total = tasks.len();
    let mut completed = Vec::with_capacity(total);
    let mut failed = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(value)) => completed.push(value),
            Ok(Err(err)) => {
                warn!("transfer task failed: {err}");
                failed += 1;
            }
            Err(err) => {
                warn!("transfer task panicked: {err}");
                failed += 1;
            }
        }
    }

    Settled {
        completed,
        failed,
        total,
    }
}
