//! Local MUL asset storage for legacy Ultima Online client directories.
//!
//! This crate provides record-level access to the paired index/data files a
//! client installation ships (`artidx.mul` + `art.mul`, `gumpidx.mul` +
//! `gumpart.mul`, ...), with the `verdata.mul` patch overlay applied on top.
//!
//! - [`container::PairedContainer`]: one index/data pair, with snapshot
//!   reads, appends and integrity scans
//! - [`store::FileStore`]: an [`AssetStore`] reading through positioned file I/O
//! - [`store::MappedStore`]: an [`AssetStore`] serving slices of memory-mapped
//!   data files
//! - [`layout::ClientDirLayout`]: maps asset type names onto client files
//!
//! # Example
//!
//! ```rust,no_run
//! use mulkit_storage::{AssetStore, StoreConfig, open_store};
//!
//! # fn example() -> mulkit_storage::Result<()> {
//! let store = open_store(&StoreConfig::new("/path/to/uo"))?;
//! let bytes = store.get_entry("art", 0x4000)?;
//! println!("static 0x4000: {} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use mulkit_formats::FormatError;
use thiserror::Error;

// Paired index/data containers
pub mod container;

// Asset stores
pub mod store;

// Asset type to file mapping
pub mod layout;

// Configuration
pub mod config;

pub use config::{Backend, CacheSettings, StoreConfig};
pub use container::{AppendTarget, IntegrityReport, PairedContainer, PatchOverlay, Snapshot};
pub use layout::{AssetPaths, ClientDirLayout, PathResolver, StaticLayout};
pub use store::{AssetStore, FileStore, MappedStore, open_store};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record index is past the end of the index table.
    #[error("record {index} out of range (entry count {count})")]
    OutOfRange {
        /// Requested record index
        index: usize,
        /// Number of records in the snapshot
        count: usize,
    },

    /// Record slot holds the unused sentinel.
    #[error("record {index} is unused")]
    Invalid {
        /// Requested record index
        index: usize,
    },

    /// Record points past the end of its stream.
    #[error("truncated read: {length} bytes at offset {offset} exceed stream length {available}")]
    Truncated {
        /// Payload offset
        offset: u64,
        /// Payload length
        length: u64,
        /// Length of the stream the payload was read from
        available: u64,
    },

    /// Index or patch table structure is unusable.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// Memory mapping no longer matches the file on disk.
    #[error("stale mapping for {asset_type}: mapped {mapped} bytes, file now has {current}")]
    Stale {
        /// Asset type whose mapping went stale
        asset_type: String,
        /// Length of the mapping
        mapped: u64,
        /// Current length of the data file
        current: u64,
    },

    /// Snapshot predates a write to its container.
    #[error("snapshot generation {snapshot} predates container generation {current}")]
    StaleSnapshot {
        /// Generation the snapshot was taken at
        snapshot: u64,
        /// Current generation of the container
        current: u64,
    },

    /// No files are known for the asset type.
    #[error("unknown asset type: {0}")]
    UnknownAssetType(String),

    /// Append would exceed the 31-bit offset or length range.
    #[error("container full: {0}")]
    ContainerFull(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FormatError> for StorageError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Io(err) => Self::Io(err),
            other => Self::MalformedContainer(other.to_string()),
        }
    }
}

/// Version information for the storage system.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default patch overlay filename in a client directory.
pub const DEFAULT_PATCH_FILE: &str = "verdata.mul";

/// Environment variable naming the client directory for tools and examples.
pub const CLIENT_DIR_ENV: &str = "UO_DIR";
