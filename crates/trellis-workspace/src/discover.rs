use std::path::Path;

use trellis_core::{ManifestLocation, MANIFEST_FILE_NAME};

/// Every `pom.xml` under `root`, sorted. Build output (`target/`) and hidden directories are
/// skipped.
pub fn discover_manifests(root: &Path) -> Vec<ManifestLocation> {
    let mut out: Vec<ManifestLocation> = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !(name == "target" || name.starts_with('.'))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE_NAME)
        .map(|entry| ManifestLocation::new(entry.into_path()))
        .collect();
    out.sort();
    out.dedup();
    out
}
