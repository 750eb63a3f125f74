//! Record-level asset stores
//!
//! [`AssetStore`] is the single capability higher layers (image decoders,
//! exporters, caches) depend on. Two backends implement it:
//!
//! - [`FileStore`]: pooled [`PairedContainer`](crate::PairedContainer)s read
//!   through file handles
//! - [`MappedStore`]: data files memory-mapped once, records served as
//!   slices of the mapping

mod file;
mod mapped;

pub use file::FileStore;
pub use mapped::MappedStore;

use crate::config::{Backend, StoreConfig};
use crate::Result;
use bytes::Bytes;
use std::sync::Arc;
use tracing::info;

/// Fetch record payloads by asset type and index.
pub trait AssetStore: Send + Sync {
    /// Payload of record `index` of `asset_type`, with the patch overlay
    /// applied.
    fn get_entry(&self, asset_type: &str, index: usize) -> Result<Bytes>;
}

impl<S: AssetStore + ?Sized> AssetStore for Arc<S> {
    fn get_entry(&self, asset_type: &str, index: usize) -> Result<Bytes> {
        (**self).get_entry(asset_type, index)
    }
}

impl<S: AssetStore + ?Sized> AssetStore for Box<S> {
    fn get_entry(&self, asset_type: &str, index: usize) -> Result<Bytes> {
        (**self).get_entry(asset_type, index)
    }
}

/// Open the store described by `config`.
///
/// The `cache` section is not applied here; wrap the result in a record
/// cache to honor it.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn AssetStore>> {
    config.validate()?;
    let layout = Arc::new(config.layout());

    info!(
        "Opening {:?} store over {}",
        config.backend,
        config.root.display()
    );
    let store: Box<dyn AssetStore> = match config.backend {
        Backend::File => Box::new(FileStore::new(layout)?),
        Backend::Mapped => Box::new(MappedStore::new(layout)?),
    };
    Ok(store)
}
