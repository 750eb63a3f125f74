//! Error types for cache construction

use mulkit_storage::StorageError;
use thiserror::Error;

/// Errors that can occur when building a record cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<CacheError> for StorageError {
    fn from(err: CacheError) -> Self {
        Self::Config(err.to_string())
    }
}
