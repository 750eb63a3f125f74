//! Patch overlay stream (`verdata.mul`)

use super::read_exact_at;
use crate::Result;
use mulkit_formats::PatchTable;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// An open patch stream together with its parsed descriptor table.
///
/// One overlay is shared by every container of a client directory.
#[derive(Debug)]
pub struct PatchOverlay {
    path: PathBuf,
    table: PatchTable,
    stream: File,
}

impl PatchOverlay {
    /// Open the patch stream at `path` and parse its descriptor table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let table = PatchTable::read_from(&mut BufReader::new(&file))?;

        if table.is_truncated() {
            warn!(
                "Patch table {} declares {} descriptors but ends early; keeping {}",
                path.display(),
                table.declared_count(),
                table.len()
            );
        }
        info!(
            "Loaded patch overlay {} with {} descriptors",
            path.display(),
            table.len()
        );

        Ok(Self {
            path,
            table,
            stream: file,
        })
    }

    /// Path of the patch stream
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed descriptor table
    pub fn table(&self) -> &PatchTable {
        &self.table
    }

    /// Current length of the patch stream in bytes
    pub fn stream_len(&self) -> Result<u64> {
        Ok(self.stream.metadata()?.len())
    }

    /// Read `length` bytes at `offset`, bounded by `available`.
    pub(crate) fn read_at(&self, offset: u64, length: u64, available: u64) -> Result<Vec<u8>> {
        read_exact_at(&self.stream, offset, length, available)
    }
}
