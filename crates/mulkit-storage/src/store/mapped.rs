//! Asset store over memory-mapped data files

use super::{AssetStore, FileStore};
use crate::container::{PairedContainer, Snapshot, location_offset};
use crate::layout::PathResolver;
use crate::{Result, StorageError};
use bytes::Bytes;
use dashmap::DashMap;
use memmap2::MmapOptions;
use std::fs::File;
use std::sync::Arc;
use tracing::{debug, info};

/// A mapped data file and the index snapshot taken alongside it.
struct Mapping {
    container: Arc<PairedContainer>,
    snapshot: Arc<Snapshot>,
    bytes: Bytes,
}

impl Mapping {
    fn mapped_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Fail when the data file or index changed since the mapping was made.
    fn check_fresh(&self) -> Result<()> {
        let current = std::fs::metadata(&self.container.paths().data)?.len();
        let mapped = self.mapped_len();
        if current != mapped {
            return Err(StorageError::Stale {
                asset_type: self.container.asset_type().to_string(),
                mapped,
                current,
            });
        }

        let generation = self.container.generation();
        if self.snapshot.generation() != generation {
            return Err(StorageError::StaleSnapshot {
                snapshot: self.snapshot.generation(),
                current: generation,
            });
        }
        Ok(())
    }
}

/// Asset store that serves records as slices of memory-mapped data files.
///
/// Each asset type's data file is mapped on first use and kept until
/// [`MappedStore::remap`]. Every access compares the file's current size
/// with the mapping and reports [`StorageError::Stale`] on mismatch rather
/// than serving bytes from an outdated view. Records replaced by the patch
/// overlay are read through the file path, since the patch stream is not
/// mapped.
pub struct MappedStore {
    files: FileStore,
    mappings: DashMap<String, Arc<Mapping>>,
}

impl MappedStore {
    /// Create a store over the files named by `resolver`.
    pub fn new(resolver: Arc<dyn PathResolver>) -> Result<Self> {
        Ok(Self {
            files: FileStore::new(resolver)?,
            mappings: DashMap::new(),
        })
    }

    /// File-backed store used for containers and patched records
    pub fn files(&self) -> &FileStore {
        &self.files
    }

    /// Zero-copy view of record `index` of `asset_type`.
    ///
    /// The returned [`Bytes`] keeps the mapping alive, so it stays valid
    /// after a [`MappedStore::remap`].
    pub fn get_entry_view(&self, asset_type: &str, index: usize) -> Result<Bytes> {
        let mapping = self.mapping(asset_type)?;
        mapping.check_fresh()?;

        let location = mapping.container.resolve(index, &mapping.snapshot)?;
        if location.is_patch() {
            debug!(
                "{} record {} is patched; reading from the patch stream",
                mapping.container.asset_type(),
                index
            );
            return mapping
                .container
                .read(index, &mapping.snapshot)
                .map(Bytes::from);
        }

        let offset = location_offset(index, &location)?;
        let length = u64::from(location.length);
        let available = mapping.mapped_len();
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= available)
            .ok_or(StorageError::Truncated {
                offset,
                length,
                available,
            })?;

        Ok(mapping.bytes.slice(offset as usize..end as usize))
    }

    /// Drop the mapping of `asset_type` and map the data file again.
    ///
    /// This is how callers recover from a [`StorageError::Stale`] report.
    pub fn remap(&self, asset_type: &str) -> Result<()> {
        let key = asset_type.trim().to_ascii_lowercase();
        self.mappings.remove(&key);
        let mapping = Arc::new(self.map(&key)?);
        self.mappings.insert(key, mapping);
        Ok(())
    }

    /// Length of the current mapping of `asset_type`, if mapped
    pub fn mapped_len(&self, asset_type: &str) -> Option<u64> {
        self.mappings
            .get(&asset_type.trim().to_ascii_lowercase())
            .map(|mapping| mapping.mapped_len())
    }

    fn mapping(&self, asset_type: &str) -> Result<Arc<Mapping>> {
        let key = asset_type.trim().to_ascii_lowercase();
        if let Some(mapping) = self.mappings.get(&key) {
            return Ok(Arc::clone(mapping.value()));
        }

        let mapping = Arc::new(self.map(&key)?);
        let installed = self.mappings.entry(key).or_insert(mapping);
        Ok(Arc::clone(installed.value()))
    }

    fn map(&self, asset_type: &str) -> Result<Mapping> {
        let container = self.files.container(asset_type)?;
        container.refresh();

        let file = File::open(&container.paths().data)?;
        let len = file.metadata()?.len();
        let bytes = if len == 0 {
            // Zero-length files cannot be mapped on every platform.
            Bytes::new()
        } else {
            // Memory-map the data file; size changes are caught by
            // `Mapping::check_fresh` before any slice is handed out.
            #[allow(unsafe_code)]
            let mmap = unsafe { MmapOptions::new().map(&file)? };
            Bytes::from_owner(mmap)
        };
        let snapshot = container.snapshot()?;

        info!(
            "Mapped {} data file {} ({} bytes, {} entries)",
            asset_type,
            container.paths().data.display(),
            len,
            snapshot.len()
        );

        Ok(Mapping {
            container,
            snapshot,
            bytes,
        })
    }
}

impl AssetStore for MappedStore {
    fn get_entry(&self, asset_type: &str, index: usize) -> Result<Bytes> {
        self.get_entry_view(asset_type, index)
    }
}
