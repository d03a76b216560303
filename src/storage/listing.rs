//! Directory listing
//!
//! Produces the filtered, typed view of a directory's direct children.

use std::fs::{self, DirEntry};

use log::{debug, info, warn};

use crate::error::FileOpError;
use crate::filter::ExtensionFilter;
use crate::sandbox::{PathSandbox, ResolvedPath};
use crate::storage::results::{Entry, EntryKind};

/// Lists the direct children of `dir`, sorted by name.
///
/// Directories are always listed; files only when `filter` allows their
/// extension. Symbolic links are shown as their target, and only when the
/// target stays inside the sandbox.
pub fn list_directory(
    sandbox: &PathSandbox,
    dir: &ResolvedPath,
    filter: &ExtensionFilter,
) -> Result<Vec<Entry>, FileOpError> {
    let metadata =
        fs::metadata(dir.as_path()).map_err(|e| FileOpError::from_io(e, dir.relative()))?;
    if !metadata.is_dir() {
        return Err(FileOpError::NotFound(dir.relative().to_string()));
    }

    let children =
        fs::read_dir(dir.as_path()).map_err(|e| FileOpError::from_io(e, dir.relative()))?;

    let mut entries = Vec::new();
    for child in children {
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("Skipping unreadable entry in {dir}: {e}");
                continue;
            }
        };

        let Some(name) = child.file_name().to_str().map(str::to_owned) else {
            debug!("Skipping non UTF-8 entry in {dir}");
            continue;
        };

        // Listing lines are `\r\n` framed.
        if name.contains(['\r', '\n']) {
            debug!("Skipping {name:?} in {dir}: name contains a line break");
            continue;
        }

        let Some((kind, size)) = classify(sandbox, &child) else {
            debug!("Skipping {name:?} in {dir}: not a regular file or directory inside the sandbox");
            continue;
        };

        if kind == EntryKind::File && !filter.is_allowed(&name) {
            continue;
        }

        entries.push(Entry { name, kind, size });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));

    info!("Listed directory {dir} - {} entries", entries.len());

    Ok(entries)
}

/// Kind and size of a child, or `None` if it should not be revealed.
fn classify(sandbox: &PathSandbox, child: &DirEntry) -> Option<(EntryKind, u64)> {
    let file_type = child.file_type().ok()?;

    let metadata = if file_type.is_symlink() {
        let target = fs::canonicalize(child.path()).ok()?;
        if !sandbox.is_within(&target) {
            return None;
        }
        fs::metadata(&target).ok()?
    } else {
        child.metadata().ok()?
    };

    if metadata.is_dir() {
        Some((EntryKind::Directory, 0))
    } else if metadata.is_file() {
        Some((EntryKind::File, metadata.len()))
    } else {
        None
    }
}
