//! Error types for index and patch table codecs

use thiserror::Error;

/// Errors that can occur when decoding or encoding MUL tables
#[derive(Error, Debug)]
pub enum FormatError {
    /// Index stream length is not a whole number of records
    #[error("index stream of {len} bytes is not a multiple of the {record_size}-byte record size")]
    MisalignedIndex {
        /// Total length of the index stream in bytes
        len: u64,
        /// Size of one index record
        record_size: usize,
    },

    /// Patch table header or descriptor block is unusable
    #[error("malformed patch table: {0}")]
    MalformedPatchTable(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRW` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Type alias for format operation results
pub type Result<T> = std::result::Result<T, FormatError>;
