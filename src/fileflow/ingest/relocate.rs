//! File relocation to the archive or error directory
//!
//! The destination directory is created on demand. A same-named file at the
//! destination is never overwritten: the incoming name gets a timestamp
//! suffix, then a counter if even that collides. Within one filesystem the
//! move is an atomic rename; across filesystems it degrades to
//! copy-then-delete, and a failure between the copy and the delete discards
//! the copy so the source is never duplicated or lost.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::FileAccessError;

/// Move `path` into `target_dir`, returning the destination path.
pub fn relocate(path: &Path, target_dir: &Path) -> Result<PathBuf, FileAccessError> {
    fs::create_dir_all(target_dir).map_err(|e| FileAccessError::new(target_dir, e))?;

    let name = path
        .file_name()
        .ok_or_else(|| FileAccessError::new(path, "path has no file name"))?;
    let dest = disambiguate(target_dir, Path::new(name));

    match fs::rename(path, &dest) {
        Ok(()) => Ok(dest),
        // rename cannot cross filesystems; retry as copy-then-delete
        Err(rename_err) => {
            log::debug!(
                "rename '{}' -> '{}' failed ({}); falling back to copy",
                path.display(),
                dest.display(),
                rename_err
            );
            if let Err(copy_err) = fs::copy(path, &dest) {
                // A copy that failed partway may leave a truncated file
                let _ = fs::remove_file(&dest);
                return Err(FileAccessError::new(path, copy_err));
            }
            if let Err(del_err) = fs::remove_file(path) {
                // Keep the original; a stray copy is worse than a retry
                let _ = fs::remove_file(&dest);
                return Err(FileAccessError::new(path, del_err));
            }
            Ok(dest)
        }
    }
}

/// Pick a destination name that does not collide with an existing file.
fn disambiguate(target_dir: &Path, name: &Path) -> PathBuf {
    let plain = target_dir.join(name);
    if !plain.exists() {
        return plain;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let ts = Utc::now().format("%Y%m%dT%H%M%S");

    let stamped = target_dir.join(format!("{}_{}{}", stem, ts, suffix));
    if !stamped.exists() {
        return stamped;
    }

    let mut counter = 1u32;
    loop {
        let candidate = target_dir.join(format!("{}_{}_{}{}", stem, ts, counter, suffix));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
