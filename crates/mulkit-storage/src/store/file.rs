//! Asset store over pooled paired containers

use super::AssetStore;
use crate::container::{PairedContainer, PatchOverlay};
use crate::layout::PathResolver;
use crate::{Result, StorageError};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Asset store that reads records through file handles.
///
/// One [`PairedContainer`] is opened per asset type on first use and kept
/// for the store's lifetime, together with its cached snapshot.
pub struct FileStore {
    resolver: Arc<dyn PathResolver>,
    overlay: Option<Arc<PatchOverlay>>,
    containers: DashMap<String, Arc<PairedContainer>>,
}

impl FileStore {
    /// Create a store over the files named by `resolver`.
    ///
    /// The patch overlay, when the resolver reports one, is parsed here and
    /// shared by every container.
    pub fn new(resolver: Arc<dyn PathResolver>) -> Result<Self> {
        let overlay = match resolver.patch_path() {
            Some(path) => Some(Arc::new(PatchOverlay::open(path)?)),
            None => None,
        };
        Ok(Self {
            resolver,
            overlay,
            containers: DashMap::new(),
        })
    }

    /// Shared patch overlay
    pub fn overlay(&self) -> Option<&Arc<PatchOverlay>> {
        self.overlay.as_ref()
    }

    /// Pooled container for `asset_type`, opening it on first use.
    pub fn container(&self, asset_type: &str) -> Result<Arc<PairedContainer>> {
        let key = asset_type.trim().to_ascii_lowercase();
        if let Some(container) = self.containers.get(&key) {
            return Ok(Arc::clone(container.value()));
        }

        let paths = self
            .resolver
            .resolve(&key)
            .ok_or_else(|| StorageError::UnknownAssetType(asset_type.to_string()))?;
        let container = Arc::new(PairedContainer::open(&key, paths, self.overlay.clone())?);
        debug!("Pooled container for {}", key);

        let pooled = self.containers.entry(key).or_insert(container);
        Ok(Arc::clone(pooled.value()))
    }

    /// Drop the cached snapshot of `asset_type` so writes made outside this
    /// store become visible.
    pub fn refresh(&self, asset_type: &str) {
        if let Some(container) = self.containers.get(&asset_type.trim().to_ascii_lowercase()) {
            container.refresh();
        }
    }

    /// Asset types with an open container
    pub fn open_asset_types(&self) -> Vec<String> {
        self.containers.iter().map(|e| e.key().clone()).collect()
    }
}

impl AssetStore for FileStore {
    fn get_entry(&self, asset_type: &str, index: usize) -> Result<Bytes> {
        let container = self.container(asset_type)?;
        let snapshot = container.snapshot()?;
        let payload = match container.read(index, &snapshot) {
            // An append landed between snapshot and read; the cached
            // snapshot is already gone, so take the fresh one.
            Err(StorageError::StaleSnapshot { .. }) => {
                let snapshot = container.snapshot()?;
                container.read(index, &snapshot)
            }
            other => other,
        }?;
        Ok(Bytes::from(payload))
    }
}
