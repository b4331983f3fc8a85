//! On-disk layout for tasktracker
//!
//! # Directory Structure
//!
//! ```text
//! <root>/.tasktracker/
//!   config.json                       # Value sets and storage knobs
//!   tasks.json                        # { lastId, tasks }
//!   archives.json                     # { archives }
//!   dependencies.json                 # { dependencies, blockedBy }
//!   tasks.json.corrupt-<timestamp>    # Quarantined unreadable file
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Name of the data directory under the project root
pub const DATA_DIR: &str = ".tasktracker";

pub const TASKS_FILE: &str = "tasks.json";
pub const ARCHIVES_FILE: &str = "archives.json";
pub const DEPENDENCIES_FILE: &str = "dependencies.json";
pub const CONFIG_FILE: &str = "config.json";

const CORRUPT_MARKER: &str = "corrupt";

/// Path layout rooted at one project directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    /// Project root (the directory that contains `.tasktracker/`)
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir().join(TASKS_FILE)
    }

    pub fn archives_file(&self) -> PathBuf {
        self.data_dir().join(ARCHIVES_FILE)
    }

    pub fn dependencies_file(&self) -> PathBuf {
        self.data_dir().join(DEPENDENCIES_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir().join(CONFIG_FILE)
    }

    /// Quarantine path for an unreadable `path`, unique within its directory
    pub fn backup_path(&self, path: &Path, at: DateTime<Utc>) -> PathBuf {
        let stamp = at.format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "data".to_string());
        let dir = path.parent().unwrap_or(&self.root);

        let mut candidate = dir.join(format!("{file_name}.{CORRUPT_MARKER}-{stamp}"));
        let mut attempt = 1;
        while candidate.exists() {
            candidate = dir.join(format!("{file_name}.{CORRUPT_MARKER}-{stamp}-{attempt}"));
            attempt += 1;
        }
        candidate
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(self.data_dir())?;
        Ok(())
    }

    /// Check if the data directory has been created
    pub fn is_initialized(&self) -> bool {
        self.data_dir().is_dir()
    }
}
