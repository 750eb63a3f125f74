//! Bounded LRU record cache for mulkit asset stores.
//!
//! [`CachedStore`] wraps any [`AssetStore`] and keeps recently read records
//! in memory, bounded both by record count and by total payload bytes.
//! Renderers and exporters that revisit the same art, gump or texture
//! records benefit most.
//!
//! # Example
//!
//! ```rust,no_run
//! use mulkit_cache::{CacheConfig, CachedStore};
//! use mulkit_storage::{AssetStore, StoreConfig, open_store};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = open_store(&StoreConfig::new("/path/to/uo"))?;
//! let cached = CachedStore::new(store, CacheConfig::new(512, 64 * 1024 * 1024))?;
//!
//! let first = cached.get_entry("gumps", 0x0500)?; // wrapped store
//! let again = cached.get_entry("gumps", 0x0500)?; // cache hit
//! assert_eq!(first, again);
//! println!("hit rate: {:.2}", cached.stats().hit_rate());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod cached_store;
pub mod config;
pub mod error;
pub mod stats;

pub use cached_store::{CacheKey, CachedStore};
pub use config::CacheConfig;
pub use error::CacheError;
pub use stats::CacheStats;

use mulkit_storage::{AssetStore, StoreConfig};

/// Open the store described by `config`, wrapped in a record cache when the
/// configuration has a `cache` section.
pub fn open_cached(config: &StoreConfig) -> mulkit_storage::Result<Box<dyn AssetStore>> {
    let store = mulkit_storage::open_store(config)?;
    match config.cache {
        Some(settings) => Ok(Box::new(CachedStore::new(
            store,
            CacheConfig::from(settings),
        )?)),
        None => Ok(store),
    }
}
