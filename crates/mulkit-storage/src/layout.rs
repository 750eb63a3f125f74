//! Asset type to file mapping
//!
//! A client directory stores each asset type as `{type}.mul` plus
//! `{type}idx.mul`, with a handful of historical exceptions (gumps live in
//! `gumpart.mul`/`gumpidx.mul`, animations and multis use `.idx`). Filenames
//! on disk vary in case between client releases, so lookups fall back to a
//! case-insensitive directory scan.

use crate::DEFAULT_PATCH_FILE;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Files backing one asset type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    /// Index stream path
    pub index: PathBuf,
    /// Data stream path
    pub data: PathBuf,
    /// Patch overlay file id, when the asset family takes part in patching
    pub file_id: Option<i32>,
}

impl AssetPaths {
    /// Create paths for an asset type without patch overlay participation.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(index: P, data: Q) -> Self {
        Self {
            index: index.as_ref().to_path_buf(),
            data: data.as_ref().to_path_buf(),
            file_id: None,
        }
    }

    /// Set the patch overlay file id
    #[must_use]
    pub const fn with_file_id(mut self, file_id: i32) -> Self {
        self.file_id = Some(file_id);
        self
    }
}

/// Maps asset type names to the files that back them.
pub trait PathResolver: Send + Sync {
    /// Files for `asset_type`, or `None` when the type is unknown.
    fn resolve(&self, asset_type: &str) -> Option<AssetPaths>;

    /// Location of the patch overlay stream, when one is present.
    fn patch_path(&self) -> Option<PathBuf>;
}

/// Resolver for a standard client installation directory.
#[derive(Debug, Clone)]
pub struct ClientDirLayout {
    root: PathBuf,
    patch_file: Option<String>,
}

impl ClientDirLayout {
    /// Layout rooted at `root`, with `verdata.mul` as patch overlay.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            patch_file: Some(DEFAULT_PATCH_FILE.to_string()),
        }
    }

    /// Set the patch overlay filename, or disable the overlay with `None`
    #[must_use]
    pub fn with_patch_file(mut self, patch_file: Option<String>) -> Self {
        self.patch_file = patch_file;
        self
    }

    /// Client directory root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths an asset type maps to, whether or not the files exist.
    ///
    /// Use this to place a new container; [`PathResolver::resolve`] only
    /// answers for asset types present on disk.
    pub fn paths_for(&self, asset_type: &str) -> AssetPaths {
        let asset_type = asset_type.trim();
        let key = asset_type.to_ascii_lowercase();
        let (data_name, index_name) = match file_names(&key) {
            Some((data, index)) => (data.to_string(), index.to_string()),
            None => (format!("{asset_type}.mul"), format!("{asset_type}idx.mul")),
        };

        AssetPaths {
            index: find_case_insensitive(&self.root, &index_name),
            data: find_case_insensitive(&self.root, &data_name),
            file_id: patch_file_id(&key),
        }
    }
}

impl PathResolver for ClientDirLayout {
    fn resolve(&self, asset_type: &str) -> Option<AssetPaths> {
        if asset_type.trim().is_empty() {
            return None;
        }
        let paths = self.paths_for(asset_type);
        (paths.index.is_file() && paths.data.is_file()).then_some(paths)
    }

    fn patch_path(&self) -> Option<PathBuf> {
        let name = self.patch_file.as_deref()?;
        let path = find_case_insensitive(&self.root, name);
        path.is_file().then_some(path)
    }
}

/// Resolver over an explicit asset type table.
#[derive(Debug, Clone, Default)]
pub struct StaticLayout {
    assets: HashMap<String, AssetPaths>,
    patch: Option<PathBuf>,
}

impl StaticLayout {
    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the files for an asset type
    #[must_use]
    pub fn with_asset(mut self, asset_type: &str, paths: AssetPaths) -> Self {
        self.assets.insert(asset_type.trim().to_ascii_lowercase(), paths);
        self
    }

    /// Set the patch overlay stream
    #[must_use]
    pub fn with_patch<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.patch = Some(path.as_ref().to_path_buf());
        self
    }
}

impl PathResolver for StaticLayout {
    fn resolve(&self, asset_type: &str) -> Option<AssetPaths> {
        self.assets
            .get(&asset_type.trim().to_ascii_lowercase())
            .cloned()
    }

    fn patch_path(&self) -> Option<PathBuf> {
        self.patch.clone()
    }
}

/// `(data, index)` filenames for asset types that break the naming rule.
fn file_names(key: &str) -> Option<(&'static str, &'static str)> {
    let names = match key {
        "texmaps" => ("texmaps.mul", "texidx.mul"),
        "gump" | "gumps" | "gumpart" => ("gumpart.mul", "gumpidx.mul"),
        "multi" | "multis" => ("multi.mul", "multi.idx"),
        "anim" => ("anim.mul", "anim.idx"),
        "anim2" => ("anim2.mul", "anim2.idx"),
        "anim3" => ("anim3.mul", "anim3.idx"),
        "anim4" => ("anim4.mul", "anim4.idx"),
        "anim5" => ("anim5.mul", "anim5.idx"),
        "anim6" => ("anim6.mul", "anim6.idx"),
        "skills" => ("skills.mul", "skills.idx"),
        _ => return None,
    };
    Some(names)
}

/// Patch overlay file id of an asset family.
pub fn patch_file_id(asset_type: &str) -> Option<i32> {
    let id = match asset_type.trim().to_ascii_lowercase().as_str() {
        "art" => 4,
        "anim" => 6,
        "sound" => 8,
        "texmaps" => 10,
        "gump" | "gumps" | "gumpart" => 12,
        "multi" | "multis" => 14,
        "skills" => 16,
        _ => return None,
    };
    Some(id)
}

/// `base/name`, or the directory entry whose name matches ignoring case.
fn find_case_insensitive(base: &Path, name: &str) -> PathBuf {
    let direct = base.join(name);
    if direct.exists() {
        return direct;
    }

    let Ok(entries) = std::fs::read_dir(base) else {
        return direct;
    };
    entries
        .filter_map(std::result::Result::ok)
        .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map_or(direct, |entry| entry.path())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").expect("create file");
    }

    #[test]
    fn test_default_naming() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "hues.mul");
        touch(dir.path(), "huesidx.mul");

        let layout = ClientDirLayout::new(dir.path());
        let paths = layout.resolve("hues").expect("hues present");
        assert_eq!(paths.data, dir.path().join("hues.mul"));
        assert_eq!(paths.index, dir.path().join("huesidx.mul"));
        assert_eq!(paths.file_id, None);
    }

    #[test]
    fn test_overrides_and_file_ids() {
        let layout = ClientDirLayout::new("/uo");

        let gumps = layout.paths_for("Gumps");
        assert_eq!(gumps.data, PathBuf::from("/uo/gumpart.mul"));
        assert_eq!(gumps.index, PathBuf::from("/uo/gumpidx.mul"));
        assert_eq!(gumps.file_id, Some(12));

        let anim = layout.paths_for("anim3");
        assert_eq!(anim.index, PathBuf::from("/uo/anim3.idx"));
        assert_eq!(anim.file_id, None);

        assert_eq!(layout.paths_for("texmaps").index, PathBuf::from("/uo/texidx.mul"));
        assert_eq!(layout.paths_for("art").file_id, Some(4));
        assert_eq!(layout.paths_for("multi").file_id, Some(14));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "ART.MUL");
        touch(dir.path(), "ArtIdx.mul");
        touch(dir.path(), "VERDATA.MUL");

        let layout = ClientDirLayout::new(dir.path());
        let paths = layout.resolve("art").expect("art present");
        assert_eq!(paths.data.file_name().and_then(|n| n.to_str()), Some("ART.MUL"));
        assert_eq!(
            paths.index.file_name().and_then(|n| n.to_str()),
            Some("ArtIdx.mul")
        );
        assert!(layout.patch_path().is_some());
    }

    #[test]
    fn test_missing_files_unresolved() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "art.mul");

        let layout = ClientDirLayout::new(dir.path());
        assert!(layout.resolve("art").is_none());
        assert!(layout.resolve("").is_none());
        assert!(layout.patch_path().is_none());
    }

    #[test]
    fn test_patch_overlay_disabled() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "verdata.mul");

        let layout = ClientDirLayout::new(dir.path()).with_patch_file(None);
        assert!(layout.patch_path().is_none());
    }

    #[test]
    fn test_static_layout() {
        let layout = StaticLayout::new()
            .with_asset("Art", AssetPaths::new("/a/i", "/a/d").with_file_id(4))
            .with_patch("/a/p");

        let paths = layout.resolve("art").expect("registered");
        assert_eq!(paths.file_id, Some(4));
        assert!(layout.resolve("sound").is_none());
        assert_eq!(layout.patch_path(), Some(PathBuf::from("/a/p")));
    }
}
