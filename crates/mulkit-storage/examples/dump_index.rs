//! Dump the index records of one asset type from a client directory.
//!
//! Usage:
//!   UO_DIR=/path/to/uo cargo run --example dump_index -p mulkit-storage -- art

mod common;

use mulkit_formats::index;
use mulkit_storage::{ClientDirLayout, PathResolver};
use tracing::warn;

fn main() -> anyhow::Result<()> {
    common::init_tracing();
    let root = common::client_dir()?;
    let asset_type = common::asset_type_arg("art");

    let layout = ClientDirLayout::new(&root);
    let paths = layout
        .resolve(&asset_type)
        .ok_or_else(|| anyhow::anyhow!("no files for asset type {asset_type}"))?;
    println!("Index: {}", paths.index.display());
    println!("Data:  {}", paths.data.display());

    // Read the raw table leniently so damaged indices can still be inspected.
    let raw = std::fs::read(&paths.index)?;
    let trailing = raw.len() % index::INDEX_RECORD_SIZE;
    if trailing != 0 {
        warn!("Ignoring {} trailing bytes after the last whole record", trailing);
    }
    let entries = index::parse_all(&raw);

    let used = entries.iter().filter(|e| e.is_valid()).count();
    let patched = entries.iter().filter(|e| e.is_valid() && e.is_patched()).count();
    println!(
        "{} slots, {} used, {} flagged as patched\n",
        entries.len(),
        used,
        patched
    );

    for (i, entry) in entries.iter().enumerate().filter(|(_, e)| e.is_valid()).take(20) {
        println!(
            "  {:>6}  offset={:>10} length={:>8} extra=0x{:08x}{}",
            i,
            entry.offset,
            entry.decoded_length(),
            entry.extra,
            if entry.is_patched() { "  [patched]" } else { "" }
        );
    }
    if used > 20 {
        println!("  ... and {} more", used - 20);
    }
    Ok(())
}
