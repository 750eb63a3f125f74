#![allow(dead_code)]

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Read the client directory from `UO_DIR`.
pub fn client_dir() -> anyhow::Result<PathBuf> {
    let path = std::env::var(mulkit_storage::CLIENT_DIR_ENV).map_err(|_| {
        anyhow::anyhow!(
            "{} environment variable not set.\n\
             Set it to your Ultima Online client directory, e.g.:\n\
             export {}=\"/path/to/Ultima Online\"",
            mulkit_storage::CLIENT_DIR_ENV,
            mulkit_storage::CLIENT_DIR_ENV
        )
    })?;
    anyhow::ensure!(!path.is_empty(), "{} is empty", mulkit_storage::CLIENT_DIR_ENV);
    let p = PathBuf::from(&path);
    anyhow::ensure!(p.is_dir(), "{} does not exist: {path}", mulkit_storage::CLIENT_DIR_ENV);
    Ok(p)
}

/// Asset type from the first command line argument, or `default`.
pub fn asset_type_arg(default: &str) -> String {
    std::env::args().nth(1).unwrap_or_else(|| default.to_string())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Hex-encode up to `max` bytes.
pub fn hex_preview(bytes: &[u8], max: usize) -> String {
    let shown: Vec<String> = bytes.iter().take(max).map(|b| format!("{b:02x}")).collect();
    let mut out = shown.join(" ");
    if bytes.len() > max {
        out.push_str(" ..");
    }
    out
}
