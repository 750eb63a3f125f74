//! Paired index/data containers
//!
//! A [`PairedContainer`] owns one asset type's index stream and data stream,
//! plus a shared handle on the client directory's [`PatchOverlay`]. Reads go
//! through a [`Snapshot`] of the index table; appends bump the container's
//! generation so that older snapshots are refused instead of silently
//! reading superseded records.

mod integrity;
mod overlay;

pub use integrity::{IntegrityReport, RecordStatus};
pub use overlay::PatchOverlay;

use crate::layout::AssetPaths;
use crate::{Result, StorageError};
use mulkit_formats::index::{self, INDEX_RECORD_SIZE, IndexEntry};
use mulkit_formats::{RecordSource, ResolvedLocation};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Where [`PairedContainer::append_raw`] stores the new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendTarget {
    /// A new slot at the end of the index
    New,
    /// Overwrite the slot at this index, growing the index with unused
    /// slots when it lies past the end
    Replace(usize),
}

/// Immutable view of a container's index table.
#[derive(Debug, Clone)]
pub struct Snapshot {
    entries: Vec<IndexEntry>,
    data_len: u64,
    patch_len: Option<u64>,
    generation: u64,
}

impl Snapshot {
    /// Index records in slot order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Record at `index`, if in range
    pub fn entry(&self, index: usize) -> Option<&IndexEntry> {
        self.entries.get(index)
    }

    /// Number of index slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no slots
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Data stream length when the snapshot was taken
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    /// Patch stream length when the snapshot was taken
    pub fn patch_len(&self) -> Option<u64> {
        self.patch_len
    }

    /// Container generation the snapshot belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One asset type's index and data streams.
pub struct PairedContainer {
    asset_type: String,
    paths: AssetPaths,
    data: File,
    overlay: Option<Arc<PatchOverlay>>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    generation: AtomicU64,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for PairedContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairedContainer")
            .field("asset_type", &self.asset_type)
            .field("paths", &self.paths)
            .field("patched", &self.overlay.is_some())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl PairedContainer {
    /// Open an existing container.
    ///
    /// The data stream is opened immediately; the index stream is read when
    /// the first snapshot is taken.
    pub fn open(
        asset_type: &str,
        paths: AssetPaths,
        overlay: Option<Arc<PatchOverlay>>,
    ) -> Result<Self> {
        let data = File::open(&paths.data)?;
        debug!(
            "Opened {} container: index={} data={}",
            asset_type,
            paths.index.display(),
            paths.data.display()
        );

        // Records outside a patch family never consult the overlay.
        let overlay = overlay.filter(|_| paths.file_id.is_some());

        Ok(Self {
            asset_type: asset_type.to_string(),
            paths,
            data,
            overlay,
            snapshot: RwLock::new(None),
            generation: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        })
    }

    /// Create empty index and data streams if missing, then open them.
    pub fn create(
        asset_type: &str,
        paths: AssetPaths,
        overlay: Option<Arc<PatchOverlay>>,
    ) -> Result<Self> {
        for path in [&paths.index, &paths.data] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            OpenOptions::new().create(true).append(true).open(path)?;
        }
        info!(
            "Created {} container at {}",
            asset_type,
            paths.data.display()
        );
        Self::open(asset_type, paths, overlay)
    }

    /// Asset type name
    pub fn asset_type(&self) -> &str {
        &self.asset_type
    }

    /// Backing file paths
    pub fn paths(&self) -> &AssetPaths {
        &self.paths
    }

    /// Shared patch overlay, if this container takes part in patching
    pub fn overlay(&self) -> Option<&Arc<PatchOverlay>> {
        self.overlay.as_ref()
    }

    /// Current write generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of whole records currently in the index stream.
    pub fn entry_count(&self) -> Result<usize> {
        let len = std::fs::metadata(&self.paths.index)?.len();
        Ok(index::entry_count(len))
    }

    /// Snapshot of the index table and stream lengths.
    ///
    /// The snapshot is cached and handed out again until an append or
    /// [`PairedContainer::refresh`] drops it.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        if let Some(cached) = self.snapshot.read().as_ref() {
            return Ok(Arc::clone(cached));
        }

        let generation = self.generation();
        let raw = std::fs::read(&self.paths.index)?;
        let entries = index::parse_all_strict(&raw)?;
        let data_len = self.data.metadata()?.len();
        let patch_len = match &self.overlay {
            Some(overlay) => Some(overlay.stream_len()?),
            None => None,
        };

        let snapshot = Arc::new(Snapshot {
            entries,
            data_len,
            patch_len,
            generation,
        });
        debug!(
            "Loaded {} snapshot: {} entries, {} data bytes (generation {})",
            self.asset_type,
            snapshot.len(),
            data_len,
            generation
        );

        let mut slot = self.snapshot.write();
        if self.generation() == generation {
            *slot = Some(Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }

    /// Drop the cached snapshot so the next call re-reads the index stream.
    pub fn refresh(&self) {
        *self.snapshot.write() = None;
    }

    /// Effective location of record `index` after the patch overlay.
    pub fn locate(&self, index: usize, entry: &IndexEntry) -> ResolvedLocation {
        match (&self.overlay, self.paths.file_id) {
            (Some(overlay), Some(file_id)) => overlay.table().resolve(file_id, index, entry),
            _ => ResolvedLocation::primary(entry),
        }
    }

    /// Read the payload of record `index`.
    pub fn read(&self, index: usize, snapshot: &Snapshot) -> Result<Vec<u8>> {
        let current = self.generation();
        if snapshot.generation != current {
            return Err(StorageError::StaleSnapshot {
                snapshot: snapshot.generation,
                current,
            });
        }

        let location = self.resolve(index, snapshot)?;
        let offset = location_offset(index, &location)?;
        let length = u64::from(location.length);

        match (&self.overlay, location.source) {
            (Some(overlay), RecordSource::Patch) => {
                let available = match snapshot.patch_len {
                    Some(len) => len,
                    None => overlay.stream_len()?,
                };
                overlay.read_at(offset, length, available)
            }
            _ => read_exact_at(&self.data, offset, length, snapshot.data_len),
        }
    }

    /// Look up record `index` in `snapshot` and resolve it through the
    /// overlay, failing for out-of-range and unused slots.
    pub(crate) fn resolve(&self, index: usize, snapshot: &Snapshot) -> Result<ResolvedLocation> {
        let entry = snapshot.entry(index).ok_or(StorageError::OutOfRange {
            index,
            count: snapshot.len(),
        })?;
        if !entry.is_valid() {
            return Err(StorageError::Invalid { index });
        }

        let location = self.locate(index, entry);
        if location.source == RecordSource::UnmatchedPatchFlag {
            warn!(
                "{} record {} carries the patch flag without a matching descriptor; reading primary data",
                self.asset_type, index
            );
        }
        Ok(location)
    }

    /// Append `payload` to the data stream and point an index slot at it.
    ///
    /// The target slot, offset and length are checked before anything is
    /// written. The payload is then written and synced before the index slot,
    /// so a failure part way leaves at most unreferenced bytes at the end of
    /// the data stream. Every snapshot taken before the append is refused by
    /// [`PairedContainer::read`] afterwards. Returns the slot written.
    pub fn append_raw(&self, payload: &[u8], target: AppendTarget, extra: i32) -> Result<usize> {
        let _writer = self.write_lock.lock();

        let length = i32::try_from(payload.len()).map_err(|_| {
            StorageError::ContainerFull(format!(
                "payload of {} bytes exceeds the 31-bit length field",
                payload.len()
            ))
        })?;

        let mut index_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.paths.index)?;
        let count = index::strict_entry_count(index_file.metadata()?.len())?;
        let slot = match target {
            AppendTarget::New => count,
            AppendTarget::Replace(slot) => slot,
        };
        if i32::try_from(slot).is_err() {
            return Err(StorageError::ContainerFull(format!(
                "slot {slot} exceeds the 31-bit record index range"
            )));
        }

        let mut data_file = OpenOptions::new().append(true).open(&self.paths.data)?;
        let end_of_data = data_file.metadata()?.len();
        let offset = i32::try_from(end_of_data).map_err(|_| {
            StorageError::ContainerFull(format!(
                "data stream of {end_of_data} bytes exceeds the 31-bit offset field"
            ))
        })?;
        data_file.write_all(payload)?;
        data_file.sync_data()?;

        let position = slot.min(count) * INDEX_RECORD_SIZE;
        index_file.seek(SeekFrom::Start(position as u64))?;
        let mut writer = BufWriter::new(index_file);
        index::write_unused(&mut writer, slot.saturating_sub(count))?;
        index::write_entries(&mut writer, &[IndexEntry::new(offset, length, extra)])?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        self.invalidate();
        debug!(
            "Appended {} bytes to {} slot {} at offset {}",
            payload.len(),
            self.asset_type,
            slot,
            offset
        );
        Ok(slot)
    }

    /// Replace the whole index stream with `entries`.
    pub fn save_index(&self, entries: &[IndexEntry]) -> Result<()> {
        let _writer = self.write_lock.lock();

        let file = File::create(&self.paths.index)?;
        let mut writer = BufWriter::new(file);
        index::write_entries(&mut writer, entries)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        self.invalidate();
        info!(
            "Saved {} index with {} entries",
            self.asset_type,
            entries.len()
        );
        Ok(())
    }

    fn invalidate(&self) {
        let mut slot = self.snapshot.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *slot = None;
    }
}

/// Payload offset of a resolved location as an unsigned stream position.
pub(crate) fn location_offset(index: usize, location: &ResolvedLocation) -> Result<u64> {
    u64::try_from(location.offset).map_err(|_| {
        StorageError::MalformedContainer(format!(
            "record {index} has negative offset {}",
            location.offset
        ))
    })
}

/// Read exactly `length` bytes at `offset` from a shared file handle.
///
/// `available` is the stream length the caller's view is bounded by. The
/// read is positional, so concurrent readers of one handle never wait on
/// each other.
pub(crate) fn read_exact_at(
    file: &File,
    offset: u64,
    length: u64,
    available: u64,
) -> Result<Vec<u8>> {
    let truncated = || StorageError::Truncated {
        offset,
        length,
        available,
    };
    if offset.checked_add(length).is_none_or(|end| end > available) {
        return Err(truncated());
    }

    let mut buf = vec![0u8; usize::try_from(length).map_err(|_| truncated())?];
    if buf.is_empty() {
        return Ok(buf);
    }

    read_at_position(file, &mut buf, offset).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            truncated()
        } else {
            StorageError::Io(e)
        }
    })?;
    Ok(buf)
}

#[cfg(unix)]
fn read_at_position(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_at_position(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
