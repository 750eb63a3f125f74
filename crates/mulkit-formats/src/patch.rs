//! Patch overlay table (`verdata.mul`)
//!
//! The patch stream starts with a descriptor table followed by the
//! replacement payloads the descriptors point at:
//!
//! ```text
//! count: i32 LE
//! count x descriptor {
//!     file_id:      i32 LE   asset family (art = 4, gumps = 12, ...)
//!     record_index: i32 LE   record slot being replaced
//!     offset:       i32 LE   payload position in the patch stream
//!     length:       i32 LE   payload size, high bit masked like index records
//!     extra:        i32 LE   replacement metadata
//! }
//! payloads...
//! ```
//!
//! Descriptor offsets are absolute positions in the patch stream, so the
//! payload area begins at `4 + count * 20`.

use crate::error::{FormatError, Result};
use crate::index::{IndexEntry, LENGTH_MASK};
use binrw::{BinRead, BinWrite};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

/// Size of the patch table header (the descriptor count).
pub const PATCH_HEADER_SIZE: usize = 4;

/// Size of one serialized patch descriptor.
pub const PATCH_DESCRIPTOR_SIZE: usize = 20;

/// One replacement record in the patch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct PatchDescriptor {
    /// Asset family the replacement belongs to
    pub file_id: i32,
    /// Record slot being replaced
    pub record_index: i32,
    /// Payload position in the patch stream
    pub offset: i32,
    /// Raw payload length
    pub length: i32,
    /// Replacement metadata
    pub extra: i32,
}

impl PatchDescriptor {
    /// Payload length with the high bit masked off.
    pub const fn decoded_length(&self) -> u32 {
        self.length.cast_unsigned() & LENGTH_MASK
    }
}

/// Where a record's payload should be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// The primary data stream
    Primary,
    /// The patch stream, via a matching descriptor
    Patch,
    /// The primary data stream, although the record carries the patch flag
    /// and no descriptor matched it
    UnmatchedPatchFlag,
}

/// A record location after applying the patch overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLocation {
    /// Payload position in the stream named by `source`
    pub offset: i32,
    /// Payload length with the flag bit masked off
    pub length: u32,
    /// Metadata of the primary record
    pub extra: i32,
    /// Stream the payload lives in
    pub source: RecordSource,
}

impl ResolvedLocation {
    /// Location described by the primary record alone.
    pub const fn primary(entry: &IndexEntry) -> Self {
        Self {
            offset: entry.offset,
            length: entry.decoded_length(),
            extra: entry.extra,
            source: if entry.is_patched() {
                RecordSource::UnmatchedPatchFlag
            } else {
                RecordSource::Primary
            },
        }
    }

    /// Whether the payload lives in the patch stream.
    pub fn is_patch(&self) -> bool {
        self.source == RecordSource::Patch
    }
}

/// Parsed descriptor table of a patch stream.
#[derive(Debug, Clone, Default)]
pub struct PatchTable {
    descriptors: HashMap<(i32, i32), PatchDescriptor>,
    declared: usize,
    parsed: usize,
}

impl PatchTable {
    /// An empty table; every record resolves to the primary stream.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the descriptor table at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::read_from(&mut Cursor::new(data))
    }

    /// Parse the descriptor table from the start of a patch stream.
    ///
    /// An empty stream yields an empty table. A header shorter than four
    /// bytes or a negative count is rejected. A table cut short keeps the
    /// descriptors parsed so far; [`PatchTable::is_truncated`] reports it.
    /// When two descriptors target the same record the later one wins.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; PATCH_HEADER_SIZE];
        let filled = read_up_to(reader, &mut header)?;
        if filled == 0 {
            return Ok(Self::empty());
        }
        if filled < PATCH_HEADER_SIZE {
            return Err(FormatError::MalformedPatchTable(format!(
                "header truncated to {filled} bytes"
            )));
        }

        let count = i32::from_le_bytes(header);
        let declared = usize::try_from(count).map_err(|_| {
            FormatError::MalformedPatchTable(format!("negative descriptor count {count}"))
        })?;

        let mut descriptors = HashMap::with_capacity(declared.min(4096));
        let mut parsed = 0;
        while parsed < declared {
            match PatchDescriptor::read(reader) {
                Ok(descriptor) => {
                    descriptors.insert((descriptor.file_id, descriptor.record_index), descriptor);
                    parsed += 1;
                }
                Err(err) if err.is_eof() => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Self {
            descriptors,
            declared,
            parsed,
        })
    }

    /// Build a descriptor table (header plus descriptors, no payloads).
    ///
    /// Descriptor offsets must already account for the table size returned
    /// by [`PatchTable::table_size`].
    pub fn build(descriptors: &[PatchDescriptor]) -> Result<Vec<u8>> {
        let count = i32::try_from(descriptors.len()).map_err(|_| {
            FormatError::MalformedPatchTable(format!(
                "{} descriptors exceed the table capacity",
                descriptors.len()
            ))
        })?;
        let mut out = Cursor::new(Vec::with_capacity(Self::table_size(descriptors.len())));
        count.write_le(&mut out)?;
        for descriptor in descriptors {
            descriptor.write(&mut out)?;
        }
        Ok(out.into_inner())
    }

    /// Byte size of a table holding `count` descriptors.
    pub const fn table_size(count: usize) -> usize {
        PATCH_HEADER_SIZE + count * PATCH_DESCRIPTOR_SIZE
    }

    /// Descriptor registered for `(file_id, record_index)`, if any.
    pub fn get(&self, file_id: i32, record_index: i32) -> Option<&PatchDescriptor> {
        self.descriptors.get(&(file_id, record_index))
    }

    /// Number of distinct `(file_id, record_index)` pairs in the table.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the table holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptor count declared by the header.
    pub fn declared_count(&self) -> usize {
        self.declared
    }

    /// Whether the stream ended before the declared descriptor count.
    pub fn is_truncated(&self) -> bool {
        self.parsed < self.declared
    }

    /// Iterate over the effective descriptors in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &PatchDescriptor> {
        self.descriptors.values()
    }

    /// Resolve where the payload of record `index` of asset family
    /// `file_id` lives.
    ///
    /// The overlay applies only to a valid record whose patch flag is set and
    /// that has a matching descriptor. The descriptor then supplies offset
    /// and length while `extra` stays that of the primary record. Every other
    /// case resolves to the primary record unchanged.
    pub fn resolve(&self, file_id: i32, index: usize, primary: &IndexEntry) -> ResolvedLocation {
        if !primary.is_valid() || !primary.is_patched() {
            return ResolvedLocation::primary(primary);
        }

        let descriptor = i32::try_from(index)
            .ok()
            .and_then(|record_index| self.get(file_id, record_index));

        match descriptor {
            Some(descriptor) => ResolvedLocation {
                offset: descriptor.offset,
                length: descriptor.decoded_length(),
                extra: primary.extra,
                source: RecordSource::Patch,
            },
            None => ResolvedLocation::primary(primary),
        }
    }
}

/// Fill `buf` from `reader` until it is full or the stream ends.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}
