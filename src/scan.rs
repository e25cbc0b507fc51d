//! Directory scan: find the CBZ archives a pipeline run should process.

use std::path::{Path, PathBuf};

use crate::archive::{ArchiveError, ArchiveResult, has_cbz_extension};

/// List `.cbz` files under `dir`, sorted by path.
///
/// Hidden files and directories (leading `.`) are skipped. With `recursive`
/// set, subdirectories are descended into as well. Symlinked directories are
/// never followed; symlinked archive files are listed.
pub fn find_archives(dir: &Path, recursive: bool) -> ArchiveResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ArchiveError::NotFound {
            path: dir.display().to_string(),
        });
    }

    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| ArchiveError::io(&current, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::io(&current, e))?;
            let path = entry.path();

            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
            {
                continue;
            }

            let file_type = entry
                .file_type()
                .map_err(|e| ArchiveError::io(&path, e))?;
            if file_type.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if file_type.is_symlink() && path.is_dir() {
                tracing::debug!(path = %path.display(), "not following directory symlink");
            } else if has_cbz_extension(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    tracing::debug!(dir = %dir.display(), count = found.len(), "scanned for archives");
    Ok(found)
}
