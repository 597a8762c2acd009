use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "S", "s", "asm"];
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "inc"];

/// Recursively collect buildable sources under `root`, sorted by path.
///
/// A missing root yields no sources rather than an error.
pub fn collect_sources(root: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    collect_with_extensions(root, SOURCE_EXTENSIONS)
}

/// Headers under every existing root, sorted and without duplicates.
pub fn collect_headers(roots: &[PathBuf]) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut headers = Vec::new();
    for root in roots {
        headers.extend(collect_with_extensions(root, HEADER_EXTENSIONS)?);
    }
    headers.sort();
    headers.dedup();
    Ok(headers)
}

fn collect_with_extensions(
    root: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, walkdir::Error> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.contains(&ext))
            .unwrap_or(false);
        if matches {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}
