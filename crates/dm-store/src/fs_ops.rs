//! Directory listing and the copy/move primitives used by the lifecycle.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, StoreError};

fn read_sorted(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(StoreError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io("read directory", dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io("read directory", dir, e))?;
        let path = entry.path();
        if path.is_dir() == want_dirs {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_files_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    read_sorted(dir, false)
}

/// Subdirectories directly inside `dir`, sorted by name.
pub fn list_dirs_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    read_sorted(dir, true)
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn is_empty_file(path: &Path) -> Result<bool> {
    let metadata = fs::metadata(path).map_err(|e| StoreError::io("inspect", path, e))?;
    Ok(metadata.len() == 0)
}

/// Fail with [`StoreError::DestinationExists`] when anything is at `dest`.
pub fn ensure_vacant(dest: &Path) -> Result<()> {
    if fs::symlink_metadata(dest).is_ok() {
        return Err(StoreError::DestinationExists {
            path: dest.to_path_buf(),
        });
    }
    Ok(())
}

/// Copy `source` to `dest`, creating parent directories. An existing
/// `dest` is never replaced.
pub fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    ensure_vacant(dest)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory", parent, e))?;
    }
    fs::copy(source, dest).map_err(|e| StoreError::io("copy", source, e))?;
    debug!(from = %source.display(), to = %dest.display(), "copied file");
    Ok(())
}

/// Move `source` to `dest`. Falls back to copy and delete when a rename
/// is not possible (e.g. across filesystems). An existing `dest` is never
/// replaced.
pub fn move_file(source: &Path, dest: &Path) -> Result<()> {
    ensure_vacant(dest)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory", parent, e))?;
    }
    if fs::rename(source, dest).is_err() {
        fs::copy(source, dest).map_err(|e| StoreError::io("move", source, e))?;
        fs::remove_file(source).map_err(|e| StoreError::io("remove", source, e))?;
    }
    debug!(from = %source.display(), to = %dest.display(), "moved file");
    Ok(())
}

pub fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| StoreError::io("remove", path, e))
}

/// Remove every empty directory below `base`, deepest first. `base` itself
/// is kept. Returns the number of directories removed.
pub fn remove_empty_dirs(base: &Path) -> Result<usize> {
    fn prune(dir: &Path) -> Result<(usize, bool)> {
        let mut removed = 0;
        let mut empty = true;
        let entries = fs::read_dir(dir).map_err(|e| StoreError::io("read directory", dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io("read directory", dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                let (count, child_empty) = prune(&path)?;
                removed += count;
                if child_empty {
                    fs::remove_dir(&path).map_err(|e| StoreError::io("remove directory", &path, e))?;
                    removed += 1;
                } else {
                    empty = false;
                }
            } else {
                empty = false;
            }
        }
        Ok((removed, empty))
    }

    if !base.is_dir() {
        return Ok(0);
    }
    let (removed, _) = prune(base)?;
    Ok(removed)
}
