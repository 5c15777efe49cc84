// File enumeration and content fingerprints

use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use super::registry::ParserRegistry;
use crate::config::PathFilter;
use crate::error::IndexError;
use crate::index::paths::relative_path;

/// Root-relative paths of every indexable file, sorted.
///
/// Honors the exclude/include globs, skips files over `max_file_size` and
/// files no registered parser owns.
pub fn discover(
    root: &Path,
    filter: &PathFilter,
    registry: &ParserRegistry,
    max_file_size: u64,
    warnings: &mut Vec<IndexError>,
) -> Vec<String> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        filter.allows_dir(&relative_path(root, entry.path()))
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                match e.into_io_error() {
                    Some(source) => warnings.push(IndexError::UnreadableFile { path, source }),
                    None => debug!("Skipping {}: filesystem loop", path.display()),
                }
                continue;
            }
        };
        if !entry.file_type().is_file() || !registry.supports(entry.path()) {
            continue;
        }

        let relative = relative_path(root, entry.path());
        if !filter.allows_file(&relative) {
            continue;
        }

        match entry.metadata() {
            Ok(meta) if meta.len() > max_file_size => {
                debug!("Skipping {} ({} bytes over limit)", relative, meta.len());
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                if let Some(source) = e.into_io_error() {
                    warnings.push(IndexError::UnreadableFile {
                        path: entry.path().to_path_buf(),
                        source,
                    });
                }
                continue;
            }
        }

        files.push(relative);
    }

    files.sort();
    files
}

/// `"sha256:"` followed by the first 16 hex chars of the digest.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("sha256:{}", hex)
}

pub fn line_count(bytes: &[u8]) -> usize {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = bytes.iter().filter(|&&b| b == b'\n').count();
    if bytes.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}
