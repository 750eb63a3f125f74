//! Binary formats for legacy Ultima Online MUL asset containers.
//!
//! Asset types such as `art`, `gumpart` or `sound` are stored as a pair of
//! files: a packed index of fixed 12-byte records and a data file holding the
//! payloads. An optional patch file (`verdata.mul`) carries replacement
//! payloads for individual records, addressed by `(file_id, record_index)`.
//!
//! This crate only encodes and decodes those tables:
//!
//! - [`index`] - [`IndexEntry`] and the record table codec
//! - [`patch`] - [`PatchDescriptor`], [`PatchTable`] and overlay resolution
//!
//! # Example
//!
//! ```rust
//! use mulkit_formats::index::{self, IndexEntry};
//!
//! # fn main() -> mulkit_formats::Result<()> {
//! let entries = vec![IndexEntry::new(0, 5, 0), IndexEntry::UNUSED];
//! let bytes = index::write_all(&entries)?;
//! assert_eq!(bytes.len(), 24);
//!
//! let parsed = index::parse_all(&bytes);
//! assert!(parsed[0].is_valid());
//! assert!(!parsed[1].is_valid());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
pub mod index;
pub mod patch;

pub use error::{FormatError, Result};
pub use index::{INDEX_RECORD_SIZE, IndexEntry};
pub use patch::{PatchDescriptor, PatchTable, RecordSource, ResolvedLocation};
