//! Cache configuration

use mulkit_storage::CacheSettings;
use serde::{Deserialize, Serialize};

/// Bounds of a [`CachedStore`](crate::CachedStore)
///
/// Both bounds hold after every call: the cache never keeps more than
/// `max_entries` records or more than `max_bytes` payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached records
    pub max_entries: usize,
    /// Maximum total payload bytes
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            max_bytes: 256 * 1024 * 1024, // 256 MiB
        }
    }
}

impl CacheConfig {
    /// Create a configuration with the given bounds
    pub const fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries,
            max_bytes,
        }
    }

    /// Set the maximum number of cached records
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the maximum total payload bytes
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }

        if self.max_bytes == 0 {
            return Err("max_bytes must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl From<CacheSettings> for CacheConfig {
    fn from(settings: CacheSettings) -> Self {
        Self::new(settings.max_entries, settings.max_bytes)
    }
}
