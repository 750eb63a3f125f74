//! Scan every record of one asset type and export the first few payloads.
//!
//! Usage:
//!   UO_DIR=/path/to/uo cargo run --example scan_integrity -p mulkit-storage -- gumps

mod common;

use mulkit_storage::{AssetStore, FileStore, StoreConfig};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    common::init_tracing();
    let config = StoreConfig::new(common::client_dir()?);
    let asset_type = common::asset_type_arg("art");

    let store = FileStore::new(Arc::new(config.layout()))?;
    let container = store.container(&asset_type)?;
    let snapshot = container.snapshot()?;

    let report = container.scan_integrity(&snapshot);
    println!("{}", serde_json::to_string_pretty(&report)?);

    // One snapshot serves the whole export loop.
    println!("\n=== First readable records ===");
    for index in container.iter_valid_indices(&snapshot, 0..snapshot.len()).take(5) {
        let payload = container.read(index, &snapshot)?;
        println!(
            "  {:>6}  {:>8} bytes  {}",
            index,
            payload.len(),
            common::hex_preview(&payload, 16)
        );
    }

    if let Some(first) = container.first_valid_index(&snapshot, 0) {
        let bytes = store.get_entry(&asset_type, first)?;
        println!("\nget_entry({asset_type}, {first}) -> {} bytes", bytes.len());
    }

    if !report.is_clean() {
        anyhow::bail!("{} records failed the integrity scan", report.broken_count());
    }
    Ok(())
}
