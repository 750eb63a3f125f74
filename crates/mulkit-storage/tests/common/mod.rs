//! Fixture helpers shared by the storage integration tests.

#![allow(dead_code, clippy::expect_used)]

use mulkit_formats::index::{self, IndexEntry};
use mulkit_formats::{PatchDescriptor, PatchTable};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Install a test log subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Index record with the patch flag set.
pub fn flagged(offset: i32, length: u32, extra: i32) -> IndexEntry {
    IndexEntry::new(offset, (length | 0x8000_0000).cast_signed(), extra)
}

/// Write an index/data pair into `dir`.
pub fn write_pair(
    dir: &Path,
    index_name: &str,
    data_name: &str,
    entries: &[IndexEntry],
    data: &[u8],
) {
    let table = index::write_all(entries).expect("encode index");
    std::fs::write(dir.join(index_name), table).expect("write index");
    std::fs::write(dir.join(data_name), data).expect("write data");
}

/// Write `verdata.mul` into `dir` with one descriptor per
/// `(file_id, record_index, payload, extra)`.
pub fn write_patch(dir: &Path, records: &[(i32, i32, &[u8], i32)]) {
    let mut offset = PatchTable::table_size(records.len());
    let mut descriptors = Vec::new();
    let mut payloads = Vec::new();
    for (file_id, record_index, payload, extra) in records {
        descriptors.push(PatchDescriptor {
            file_id: *file_id,
            record_index: *record_index,
            offset: i32::try_from(offset).expect("small fixture"),
            length: i32::try_from(payload.len()).expect("small fixture"),
            extra: *extra,
        });
        payloads.extend_from_slice(payload);
        offset += payload.len();
    }

    let mut stream = PatchTable::build(&descriptors).expect("build patch table");
    stream.extend_from_slice(&payloads);
    std::fs::write(dir.join("verdata.mul"), stream).expect("write patch");
}

/// A small client directory:
///
/// - `art` (file id 4): `[(0,4,0), unused, (4,8,0), flagged -> patched]`
///   over `b"ABCDefghijkl"`, with record 3 replaced by `b"PATCHED"`
/// - `hues` (no file id): three 2-byte records
pub fn client_dir(dir: &Path) {
    write_pair(
        dir,
        "artidx.mul",
        "art.mul",
        &[
            IndexEntry::new(0, 4, 0),
            IndexEntry::UNUSED,
            IndexEntry::new(4, 8, 0),
            flagged(0, 4, 77),
        ],
        b"ABCDefghijkl",
    );
    write_pair(
        dir,
        "huesidx.mul",
        "hues.mul",
        &[
            IndexEntry::new(0, 2, 1),
            IndexEntry::new(2, 2, 2),
            IndexEntry::new(4, 2, 3),
        ],
        b"h0h1h2",
    );
    write_patch(dir, &[(4, 3, &b"PATCHED"[..], 5)]);
}
