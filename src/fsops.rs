//! Filesystem plumbing shared by the reconcilers.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// List regular files directly under `dir`, sorted by path.
///
/// Subdirectories and entries whose metadata cannot be read are skipped;
/// symlinks are followed, matching the agent's own view of the directory.
/// The sort keeps the generated configuration stable across runs regardless
/// of readdir order.
pub fn list_regular_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => {
                crate::debug_event!("fs", "skipped non-file", "{}", path.display());
            }
            Err(e) => {
                // Entry may have vanished between readdir and stat
                crate::debug_event!("fs", "stat failed", "{}: {e}", path.display());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Write `contents` to `path` atomically.
///
/// The data goes to a temporary file in the same directory, is fsynced, and
/// then renamed over the destination, so a reader (the log-shipping agent
/// included) never observes a half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
