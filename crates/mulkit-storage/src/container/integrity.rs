//! Record validity checks and whole-container integrity scans

use super::{PairedContainer, Snapshot};
use mulkit_formats::RecordSource;
use serde::Serialize;
use std::ops::Range;
use tracing::info;

/// Outcome of checking one index slot against its backing stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Record is readable from the given stream
    Readable(RecordSource),
    /// Slot holds the unused sentinel
    Unused,
    /// Record offset is negative
    NegativeOffset,
    /// Record extends past the end of the given stream
    OutOfBounds(RecordSource),
}

impl RecordStatus {
    /// Whether a read of the record would succeed
    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Readable(_))
    }
}

/// Counts gathered by [`PairedContainer::scan_integrity`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Number of index slots
    pub entry_count: usize,
    /// Slots whose payload can be read
    pub readable_count: usize,
    /// Slots holding the unused sentinel
    pub unused_count: usize,
    /// Readable slots with a zero-length payload
    pub empty_count: usize,
    /// Readable slots served from the patch stream
    pub patched_count: usize,
    /// Slots flagged as patched that no descriptor matches
    pub unmatched_patch_count: usize,
    /// Slots with a negative offset
    pub negative_offset_count: usize,
    /// Slots pointing past the end of the data stream
    pub data_out_of_bounds_count: usize,
    /// Slots pointing past the end of the patch stream
    pub patch_out_of_bounds_count: usize,
}

impl IntegrityReport {
    /// Slots that would fail to read for a reason other than being unused
    pub fn broken_count(&self) -> usize {
        self.negative_offset_count + self.data_out_of_bounds_count + self.patch_out_of_bounds_count
    }

    /// Whether every used slot is readable
    pub fn is_clean(&self) -> bool {
        self.broken_count() == 0
    }
}

impl PairedContainer {
    /// Classify slot `index` of `snapshot` without reading its payload.
    ///
    /// Returns `None` when `index` is out of range.
    pub fn check_record(&self, index: usize, snapshot: &Snapshot) -> Option<RecordStatus> {
        let entry = snapshot.entry(index)?;
        if !entry.is_valid() {
            return Some(RecordStatus::Unused);
        }

        let location = self.locate(index, entry);
        let Ok(offset) = u64::try_from(location.offset) else {
            return Some(RecordStatus::NegativeOffset);
        };
        let available = match location.source {
            RecordSource::Patch => snapshot.patch_len().unwrap_or(0),
            RecordSource::Primary | RecordSource::UnmatchedPatchFlag => snapshot.data_len(),
        };
        let end = offset.checked_add(u64::from(location.length));

        Some(if end.is_some_and(|end| end <= available) {
            RecordStatus::Readable(location.source)
        } else {
            RecordStatus::OutOfBounds(location.source)
        })
    }

    /// Whether slot `index` holds a record that can be read.
    pub fn is_valid_at(&self, index: usize, snapshot: &Snapshot) -> bool {
        self.check_record(index, snapshot).is_some_and(|status| status.is_readable())
    }

    /// Readable slot indices within `range`, clamped to the snapshot.
    pub fn iter_valid_indices<'a>(
        &'a self,
        snapshot: &'a Snapshot,
        range: Range<usize>,
    ) -> impl Iterator<Item = usize> + 'a {
        let end = range.end.min(snapshot.len());
        (range.start..end).filter(move |&index| self.is_valid_at(index, snapshot))
    }

    /// First readable slot at or after `start`.
    pub fn first_valid_index(&self, snapshot: &Snapshot, start: usize) -> Option<usize> {
        self.iter_valid_indices(snapshot, start..snapshot.len()).next()
    }

    /// Check every slot of `snapshot` against the stream lengths.
    pub fn scan_integrity(&self, snapshot: &Snapshot) -> IntegrityReport {
        let mut report = IntegrityReport {
            entry_count: snapshot.len(),
            ..IntegrityReport::default()
        };

        for (index, entry) in snapshot.entries().iter().enumerate() {
            if entry.is_valid() && entry.is_patched() {
                let source = self.locate(index, entry).source;
                if source == RecordSource::UnmatchedPatchFlag {
                    report.unmatched_patch_count += 1;
                }
            }

            match self.check_record(index, snapshot) {
                Some(RecordStatus::Readable(source)) => {
                    report.readable_count += 1;
                    if entry.decoded_length() == 0 && source != RecordSource::Patch {
                        report.empty_count += 1;
                    }
                    if source == RecordSource::Patch {
                        report.patched_count += 1;
                    }
                }
                Some(RecordStatus::Unused) => report.unused_count += 1,
                Some(RecordStatus::NegativeOffset) => report.negative_offset_count += 1,
                Some(RecordStatus::OutOfBounds(RecordSource::Patch)) => {
                    report.patch_out_of_bounds_count += 1;
                }
                Some(RecordStatus::OutOfBounds(_)) => report.data_out_of_bounds_count += 1,
                None => {}
            }
        }

        info!(
            "Scanned {} container: {} entries, {} readable, {} unused, {} broken",
            self.asset_type(),
            report.entry_count,
            report.readable_count,
            report.unused_count,
            report.broken_count()
        );
        report
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::container::PatchOverlay;
    use crate::layout::AssetPaths;
    use mulkit_formats::index::{self, IndexEntry};
    use mulkit_formats::{PatchDescriptor, PatchTable};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn flagged(offset: i32, length: u32) -> IndexEntry {
        IndexEntry::new(offset, (length | 0x8000_0000).cast_signed(), 0)
    }

    #[test]
    fn test_scan_counts_each_status() {
        let dir = tempdir().expect("tempdir");

        let descriptors = [PatchDescriptor {
            file_id: 4,
            record_index: 4,
            offset: i32::try_from(PatchTable::table_size(1)).expect("small table"),
            length: 3,
            extra: 0,
        }];
        let mut patch = PatchTable::build(&descriptors).expect("build");
        patch.extend_from_slice(b"new");
        let patch_path = dir.path().join("verdata.mul");
        std::fs::write(&patch_path, patch).expect("write patch");

        let entries = [
            IndexEntry::new(0, 4, 0),
            IndexEntry::UNUSED,
            IndexEntry::new(4, 0, 0),
            IndexEntry::new(6, 10, 0),
            flagged(0, 2),
            flagged(0, 2),
            IndexEntry::new(-2, 1, 0),
        ];
        let paths = AssetPaths::new(dir.path().join("artidx.mul"), dir.path().join("art.mul"))
            .with_file_id(4);
        let table = index::write_all(&entries).expect("encode index");
        std::fs::write(&paths.index, table).expect("write index");
        std::fs::write(&paths.data, b"abcdefgh").expect("write data");

        let overlay = Arc::new(PatchOverlay::open(&patch_path).expect("overlay"));
        let container = PairedContainer::open("art", paths, Some(overlay)).expect("open");
        let snapshot = container.snapshot().expect("snapshot");

        let report = container.scan_integrity(&snapshot);
        assert_eq!(
            report,
            IntegrityReport {
                entry_count: 7,
                readable_count: 4,
                unused_count: 1,
                empty_count: 1,
                patched_count: 1,
                unmatched_patch_count: 1,
                negative_offset_count: 1,
                data_out_of_bounds_count: 1,
                patch_out_of_bounds_count: 0,
            }
        );
        assert!(!report.is_clean());
        assert_eq!(report.broken_count(), 2);

        assert_eq!(
            container.iter_valid_indices(&snapshot, 0..100).collect::<Vec<_>>(),
            vec![0, 2, 4, 5]
        );
        assert_eq!(container.first_valid_index(&snapshot, 1), Some(2));
        assert_eq!(container.first_valid_index(&snapshot, 6), None);
        assert!(!container.is_valid_at(1, &snapshot));
        assert_eq!(container.check_record(99, &snapshot), None);
        assert_eq!(
            container.check_record(4, &snapshot),
            Some(RecordStatus::Readable(RecordSource::Patch))
        );
    }
}
