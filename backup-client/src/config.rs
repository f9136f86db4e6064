//! Configuration for the backup client.
//!
//! Loaded from a TOML file with serde defaults, so a partial file (or none
//! at all) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Throttle window for explicit remote sync requests, in seconds.
    #[serde(default = "default_sync_window_secs")]
    pub sync_window_secs: u64,

    /// Per-call timeout applied to every remote store call, in seconds.
    /// Interactive sign-in may need a larger value than the default.
    #[serde(default = "default_remote_call_timeout_secs")]
    pub remote_call_timeout_secs: u64,

    /// Maximum concurrent file transfers within one upload/download fan-out.
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: usize,

    /// Directory restored files are written into.
    #[serde(default = "default_restore_dir")]
    pub restore_dir: PathBuf,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_sync_window_secs() -> u64 {
    60
}

fn default_remote_call_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_transfers() -> usize {
    8
}

fn default_restore_dir() -> PathBuf {
    std::env::temp_dir().join("backup-restore")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sync_window_secs: default_sync_window_secs(),
            remote_call_timeout_secs: default_remote_call_timeout_secs(),
            max_concurrent_transfers: default_max_concurrent_transfers(),
            restore_dir: default_restore_dir(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn sync_window(&self) -> Duration {
        Duration::from_secs(self.sync_window_secs)
    }

    pub fn remote_call_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_call_timeout_secs)
    }
}
