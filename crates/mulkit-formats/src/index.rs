//! Index record table codec
//!
//! An index stream is a packed array of 12-byte records with no header and
//! no trailer. Record `i` lives at byte offset `i * 12`:
//!
//! ```text
//! offset: i32 LE   byte position of the payload in the data stream
//! length: i32 LE   payload size; bit 31 flags a patch overlay replacement
//! extra:  i32 LE   asset-specific metadata, opaque here
//! ```
//!
//! A record with `offset == -1 && length == -1` is the "unused" sentinel.

use crate::error::{FormatError, Result};
use binrw::{BinRead, BinWrite};
use std::io::{Cursor, Seek, Write};

/// Size of one serialized index record in bytes.
pub const INDEX_RECORD_SIZE: usize = 12;

/// Bit in the raw `length` field marking a record as patched.
pub const PATCH_FLAG: u32 = 0x8000_0000;

/// Mask selecting the payload length from the raw `length` field.
pub const LENGTH_MASK: u32 = 0x7FFF_FFFF;

/// One record of an index stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct IndexEntry {
    /// Byte position of the payload in the data stream
    pub offset: i32,
    /// Raw length field, including the patch flag bit
    pub length: i32,
    /// Asset-specific metadata (dimensions, flags)
    pub extra: i32,
}

impl IndexEntry {
    /// The unused-slot sentinel `(-1, -1, 0)`.
    pub const UNUSED: Self = Self {
        offset: -1,
        length: -1,
        extra: 0,
    };

    /// Create a new index record.
    pub const fn new(offset: i32, length: i32, extra: i32) -> Self {
        Self {
            offset,
            length,
            extra,
        }
    }

    /// Whether the slot holds a record.
    ///
    /// Only the exact `(-1, -1)` pair marks a slot as unused. A zero-length
    /// record is valid and reads as an empty payload.
    pub const fn is_valid(&self) -> bool {
        !(self.offset == -1 && self.length == -1)
    }

    /// Whether the patch flag (bit 31 of `length`) is set.
    pub const fn is_patched(&self) -> bool {
        self.length.cast_unsigned() & PATCH_FLAG != 0
    }

    /// Payload length with the patch flag masked off.
    ///
    /// The result is unsigned, so a negative length can never escape.
    pub const fn decoded_length(&self) -> u32 {
        self.length.cast_unsigned() & LENGTH_MASK
    }
}

impl Default for IndexEntry {
    fn default() -> Self {
        Self::UNUSED
    }
}

/// Number of whole records in an index stream of `byte_len` bytes.
pub const fn entry_count(byte_len: u64) -> usize {
    (byte_len / INDEX_RECORD_SIZE as u64) as usize
}

/// Number of records in an index stream, rejecting a trailing partial record.
pub fn strict_entry_count(byte_len: u64) -> Result<usize> {
    if byte_len % INDEX_RECORD_SIZE as u64 != 0 {
        return Err(FormatError::MisalignedIndex {
            len: byte_len,
            record_size: INDEX_RECORD_SIZE,
        });
    }
    Ok(entry_count(byte_len))
}

/// Decode every whole record in `data`.
///
/// A trailing partial record is ignored. Use [`parse_all_strict`] to treat it
/// as an error instead.
pub fn parse_all(data: &[u8]) -> Vec<IndexEntry> {
    let mut cursor = Cursor::new(data);
    (0..entry_count(data.len() as u64))
        .map_while(|_| IndexEntry::read(&mut cursor).ok())
        .collect()
}

/// Decode every record in `data`, failing when its length is not a multiple
/// of [`INDEX_RECORD_SIZE`].
pub fn parse_all_strict(data: &[u8]) -> Result<Vec<IndexEntry>> {
    let count = strict_entry_count(data.len() as u64)?;
    let mut cursor = Cursor::new(data);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(IndexEntry::read(&mut cursor)?);
    }
    Ok(entries)
}

/// Serialize `entries` into a contiguous index stream.
pub fn write_all(entries: &[IndexEntry]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(entries.len() * INDEX_RECORD_SIZE));
    write_entries(&mut cursor, entries)?;
    Ok(cursor.into_inner())
}

/// Serialize `entries` to a writer, one record after another.
pub fn write_entries<W: Write + Seek>(writer: &mut W, entries: &[IndexEntry]) -> Result<()> {
    for entry in entries {
        entry.write(writer)?;
    }
    Ok(())
}

/// Write `count` unused sentinel records, one at a time.
pub fn write_unused<W: Write + Seek>(writer: &mut W, count: usize) -> Result<()> {
    for _ in 0..count {
        IndexEntry::UNUSED.write(writer)?;
    }
    Ok(())
}
