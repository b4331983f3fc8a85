//! Crash-safe file writes
//!
//! Every persisted collection is replaced as a whole file. Writes go to a
//! sibling `<name>.tmp` first and are renamed over the target, so a reader
//! sees either the old bytes or the new bytes, never a torn file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Suffix appended to the target file name for the staging file
pub const TEMP_SUFFIX: &str = ".tmp";

/// Path of the staging file used while writing `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Atomically write data to a file
///
/// Writes `<path>.tmp` in the same directory (rename must not cross
/// filesystems), syncs it, then renames it over `path`. If anything fails
/// before the rename the target keeps its previous contents.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp = temp_path(path);

    let mut temp_file = File::create(&temp)?;
    if let Err(err) = temp_file.write_all(data).and_then(|_| temp_file.sync_all()) {
        drop(temp_file);
        let _ = fs::remove_file(&temp);
        return Err(err.into());
    }
    drop(temp_file);

    if let Err(err) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(err.into());
    }

    Ok(())
}

/// Write data in place, without the temp-file step
pub fn write_direct(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}
