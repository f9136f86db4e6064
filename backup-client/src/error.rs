//! Error taxonomy for the backup protocol.
//!
//! Every failure a caller can branch on is a distinct variant; the RPC
//! boundary maps variants to stable string codes via [`BackupError::code`].

use thiserror::Error;

/// RPC error code for authentication failures.
pub const SIGN_IN_FAILED_CODE: &str = "SIGN_IN_FAILED";

/// RPC error code for backup ID ownership conflicts.
pub const BACKUP_CONFLICT_ERROR_CODE: &str = "BACKUP_CONFLICT_ERROR";

/// Generic RPC error code for everything else.
pub const GENERIC_FAILURE_CODE: &str = "FAILED";

/// Failures originating inside the remote object store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("authentication denied: {0}")]
    AuthDenied(String),

    #[error("remote resource not found: {0}")]
    NotFound(String),

    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("sign-in failed: {source}")]
    SignInFailed {
        #[source]
        source: StoreError,
    },

    /// The node folder is owned by a different backup ID.
    #[error("backup conflict: node is owned by backup ID {existing}, requested {requested}")]
    Conflict { existing: String, requested: String },

    #[error("could not upload all backup files: {failed} of {total} failed")]
    PartialUpload { failed: usize, total: usize },

    #[error("could not download all restore files: {failed} of {total} failed")]
    PartialDownload { failed: usize, total: usize },

    #[error("no backup found for this node")]
    NoBackupFound,

    #[error("remote call timed out during {op}")]
    Timeout { op: &'static str },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    /// Stable error code exposed on the RPC surface.
    pub fn code(&self) -> &'static str {
        match self {
            BackupError::SignInFailed { .. } => SIGN_IN_FAILED_CODE,
            BackupError::Conflict { .. } => BACKUP_CONFLICT_ERROR_CODE,
            _ => GENERIC_FAILURE_CODE,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
