//! Directory scanner for discovering import files

use crate::config::ImportConfig;
use crate::error::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find every importable file under the given roots.
///
/// Files are matched by the configured extensions and returned sorted by
/// path, each at most once even when roots overlap.
pub fn discover_import_files<P: AsRef<Path>>(roots: &[P], config: &ImportConfig) -> Result<Vec<PathBuf>> {
    let mut found: BTreeSet<PathBuf> = BTreeSet::new();

    for root in roots {
        for entry in WalkDir::new(root.as_ref()).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if config.accepts_file(name, None) {
                found.insert(path.to_path_buf());
            }
        }
    }

    Ok(found.into_iter().collect())
}
