//! Fetcher configuration

use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of downloads allowed in flight at once
pub const MAX_CONCURRENT_DOWNLOADS: usize = 6;

/// Default number of decoded values kept in memory
const DEFAULT_MEMORY_ENTRIES: usize = 200;

/// Directory name under the platform cache dir
const CACHE_DIR_NAME: &str = "netfetch";

/// Settings for an [`AsyncFetcher`](crate::AsyncFetcher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Directory holding one file per downloaded URI
    pub cache_dir: PathBuf,

    /// Maximum number of values in the memory cache
    pub memory_entries: usize,

    /// Maximum summed resource weight in memory (0 means unlimited)
    pub memory_bytes: usize,

    /// Maximum number of downloads running at once
    pub max_concurrent_downloads: usize,

    /// HTTP connect timeout
    pub connect_timeout_secs: u64,

    /// HTTP read timeout
    pub read_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            memory_entries: DEFAULT_MEMORY_ENTRIES,
            memory_bytes: 0,
            max_concurrent_downloads: MAX_CONCURRENT_DOWNLOADS,
            connect_timeout_secs: 30,
            read_timeout_secs: 60,
        }
    }
}

impl FetcherConfig {
    /// Default configuration rooted at the given cache directory
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Reject limits that cannot produce a working fetcher
    pub fn validate(&self) -> Result<()> {
        if self.memory_entries == 0 {
            return Err(Error::InvalidConfiguration(
                "memory_entries must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(Error::InvalidConfiguration(
                "max_concurrent_downloads must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}
