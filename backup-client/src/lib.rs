//! Backup Client Library
//!
//! Persists and recovers per-device wallet node state to a remote
//! folder-oriented object store. The store offers no native transactions,
//! so backups are committed as versioned folders with an atomic pointer
//! switch, guarded by an optimistic backup-ID ownership check.

pub mod config;
pub mod conflict;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod folders;
pub mod logging;
pub mod notify;
pub mod rpc;
pub mod store;
pub mod throttle;
pub mod transfer;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::BackupCoordinator;
pub use error::{BackupError, StoreError};
pub type Result<T> = std::result::Result<T, BackupError>;
