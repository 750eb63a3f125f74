//! Configuration for opening asset stores

use crate::layout::ClientDirLayout;
use crate::{DEFAULT_PATCH_FILE, Result, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Read path used by an asset store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Positioned reads through file handles
    #[default]
    File,
    /// Slices of memory-mapped data files
    Mapped,
}

/// Bounds for a record cache in front of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of cached records
    pub max_entries: usize,
    /// Maximum total payload bytes held by the cache
    pub max_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            max_bytes: 256 * 1024 * 1024, // 256 MiB
        }
    }
}

/// Configuration for an asset store over a client directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Client directory holding the MUL files
    pub root: PathBuf,

    /// Read path
    pub backend: Backend,

    /// Patch overlay filename inside `root`; `None` disables the overlay
    pub patch_file: Option<String>,

    /// Record cache bounds; `None` disables caching
    pub cache: Option<CacheSettings>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            backend: Backend::File,
            patch_file: Some(DEFAULT_PATCH_FILE.to_string()),
            cache: None,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration for the client directory at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Read the client directory from the `UO_DIR` environment variable
    pub fn from_env() -> Result<Self> {
        let root = std::env::var(crate::CLIENT_DIR_ENV).map_err(|_| {
            StorageError::Config(format!("{} is not set", crate::CLIENT_DIR_ENV))
        })?;
        Ok(Self::new(root))
    }

    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StorageError::Config(format!("invalid store configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Set the read path
    #[must_use]
    pub const fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the patch overlay filename
    #[must_use]
    pub fn with_patch_file(mut self, patch_file: impl Into<String>) -> Self {
        self.patch_file = Some(patch_file.into());
        self
    }

    /// Disable the patch overlay
    #[must_use]
    pub fn without_patches(mut self) -> Self {
        self.patch_file = None;
        self
    }

    /// Put a record cache with the given bounds in front of the store
    #[must_use]
    pub const fn with_cache(mut self, max_entries: usize, max_bytes: usize) -> Self {
        self.cache = Some(CacheSettings {
            max_entries,
            max_bytes,
        });
        self
    }

    /// Check the configuration for values no store can be opened with
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(StorageError::Config("root must not be empty".to_string()));
        }
        if self.patch_file.as_deref().is_some_and(str::is_empty) {
            return Err(StorageError::Config(
                "patch_file must not be empty; use null to disable patches".to_string(),
            ));
        }
        if let Some(cache) = &self.cache {
            if cache.max_entries == 0 {
                return Err(StorageError::Config(
                    "cache.max_entries must be greater than 0".to_string(),
                ));
            }
            if cache.max_bytes == 0 {
                return Err(StorageError::Config(
                    "cache.max_bytes must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Path layout of the configured client directory
    pub fn layout(&self) -> ClientDirLayout {
        ClientDirLayout::new(&self.root).with_patch_file(self.patch_file.clone())
    }
}
