#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tasktracker::TaskStore;
use tempfile::TempDir;

pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    /// Empty directory, not yet initialized
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// Directory with `.tasktracker/` created
    pub fn init() -> Result<Self, tasktracker::Error> {
        let root = Self::new();
        TaskStore::init(root.path())?;
        Ok(root)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store(&self) -> Result<TaskStore, tasktracker::Error> {
        TaskStore::open(self.path())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join(".tasktracker")
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir().join(name)
    }

    pub fn read_bytes(&self, name: &str) -> Vec<u8> {
        fs::read(self.data_file(name)).expect("read data file")
    }

    pub fn read_json(&self, name: &str) -> Value {
        serde_json::from_slice(&self.read_bytes(name)).expect("parse data file")
    }

    pub fn write_data_file(&self, name: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.data_file(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Files in `.tasktracker/` whose name starts with `prefix`
    pub fn data_files_with_prefix(&self, prefix: &str) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(self.data_dir())
            .expect("read data dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().starts_with(prefix))
                    .unwrap_or(false)
            })
            .collect();
        found.sort();
        found
    }
}

pub fn tasktracker_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tasktracker").expect("binary");
    cmd.env_remove("TASKTRACKER_ROOT");
    cmd.env_remove("TASKTRACKER_AUTHOR");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Command running inside `root`
pub fn cmd_in(root: &TestRoot) -> Command {
    let mut cmd = tasktracker_cmd();
    cmd.current_dir(root.path());
    cmd
}

/// Parse the JSON envelope printed on stdout
pub fn envelope(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout is a JSON envelope")
}
