//! Batch transactions over several files
//!
//! A [`Batch`] runs in three phases:
//! 1. every `read` fills its result slot
//! 2. every `update` closure runs against the current value; an error here
//!    aborts the batch before any file is written
//! 3. every staged value is written through the [`FileCache`], in op order
//!
//! Before phase 3 the raw bytes of each file about to be written are
//! snapshotted. If a write fails, each file already written is forced back
//! to its snapshot. This is transaction-like, not a multi-file atomic
//! commit: a crash between two writes of phase 3 leaves the earlier ones in
//! place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::cache::{FileCache, WriteOptions, WriteOutcome, DEFAULT_CACHE_TTL};
use crate::error::{Error, Result};

type UpdateFn<'a> = Box<dyn FnOnce(Value) -> Result<Value> + 'a>;

enum BatchOp<'a> {
    Read(PathBuf),
    /// `initial` stands in for the file when it does not exist
    Update {
        path: PathBuf,
        initial: Option<Value>,
        f: UpdateFn<'a>,
    },
    Write(PathBuf, Value),
}

/// Ordered list of file operations executed as a unit
pub struct Batch<'a> {
    ops: Vec<BatchOp<'a>>,
    ttl: Duration,
    options: WriteOptions,
}

/// Result of a successful batch
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Values produced by `read` ops, in op order
    pub reads: Vec<(PathBuf, Value)>,
    /// Paths whose content was replaced on disk
    pub written: Vec<PathBuf>,
    /// Paths whose staged content matched what was already there
    pub unchanged: Vec<PathBuf>,
}

impl BatchOutcome {
    /// First value read for `path`
    pub fn read(&self, path: &Path) -> Option<&Value> {
        self.reads
            .iter()
            .find(|(read_path, _)| read_path == path)
            .map(|(_, value)| value)
    }
}

struct Snapshot {
    path: PathBuf,
    bytes: Option<Vec<u8>>,
}

impl<'a> Default for Batch<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Batch<'a> {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            ttl: DEFAULT_CACHE_TTL,
            options: WriteOptions::default(),
        }
    }

    /// Freshness window used for the reads this batch performs
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_write_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn read(mut self, path: impl Into<PathBuf>) -> Self {
        self.ops.push(BatchOp::Read(path.into()));
        self
    }

    /// Stage `f(current)` for `path`; the file must already exist
    pub fn update<F>(mut self, path: impl Into<PathBuf>, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value> + 'a,
    {
        self.ops.push(BatchOp::Update {
            path: path.into(),
            initial: None,
            f: Box::new(f),
        });
        self
    }

    /// Like [`Batch::update`], but a missing file starts out as `initial`
    ///
    /// The file's absence is what gets snapshotted, so a rolled-back batch
    /// leaves no file behind.
    pub fn update_or_init<F>(mut self, path: impl Into<PathBuf>, initial: Value, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value> + 'a,
    {
        self.ops.push(BatchOp::Update {
            path: path.into(),
            initial: Some(initial),
            f: Box::new(f),
        });
        self
    }

    pub fn write(mut self, path: impl Into<PathBuf>, value: Value) -> Self {
        self.ops.push(BatchOp::Write(path.into(), value));
        self
    }

    pub fn execute(self, cache: &mut FileCache) -> Result<BatchOutcome> {
        let Batch { ops, ttl, options } = self;
        let mut outcome = BatchOutcome::default();

        let mut pending = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                BatchOp::Read(path) => {
                    let value = cache.read_value(&path, ttl)?;
                    outcome.reads.push((path, value));
                }
                other => pending.push(other),
            }
        }

        let mut staged: Vec<(PathBuf, Value)> = Vec::new();
        let mut snapshots: Vec<Snapshot> = Vec::new();
        for op in pending {
            match op {
                BatchOp::Update { path, initial, f } => {
                    // A second update of the same path sees the first one's result.
                    let position = staged.iter().position(|(staged_path, _)| *staged_path == path);
                    let current = match (position, initial) {
                        (Some(idx), _) => staged.remove(idx).1,
                        (None, None) => cache.read_value(&path, ttl)?,
                        (None, Some(initial)) => match cache.read_value(&path, ttl) {
                            Err(Error::FileNotFound(_)) => initial,
                            other => other?,
                        },
                    };
                    snapshot(cache, &mut snapshots, &path)?;
                    let next = f(current)?;
                    stage(&mut staged, path, next);
                }
                BatchOp::Write(path, value) => {
                    snapshot(cache, &mut snapshots, &path)?;
                    stage(&mut staged, path, value);
                }
                BatchOp::Read(_) => {}
            }
        }

        let mut touched: Vec<PathBuf> = Vec::new();
        for (path, value) in staged {
            match cache.write(&path, &value, options) {
                Ok(WriteOutcome::Written) => {
                    touched.push(path.clone());
                    outcome.written.push(path);
                }
                Ok(WriteOutcome::Unchanged) => outcome.unchanged.push(path),
                Err(err) => {
                    error!(
                        path = %path.display(),
                        error = %err,
                        "batch write failed, rolling back"
                    );
                    // The failed write never reached its rename, but its cache
                    // entry may be stale; restore it along with the rest.
                    touched.push(path);
                    rollback(cache, &snapshots, &touched);
                    return Err(err);
                }
            }
        }

        debug!(
            written = outcome.written.len(),
            unchanged = outcome.unchanged.len(),
            "batch committed"
        );
        Ok(outcome)
    }
}

fn stage(staged: &mut Vec<(PathBuf, Value)>, path: PathBuf, value: Value) {
    match staged.iter_mut().find(|(staged_path, _)| *staged_path == path) {
        Some(entry) => entry.1 = value,
        None => staged.push((path, value)),
    }
}

fn snapshot(cache: &FileCache, snapshots: &mut Vec<Snapshot>, path: &Path) -> Result<()> {
    if snapshots.iter().any(|snapshot| snapshot.path == path) {
        return Ok(());
    }
    snapshots.push(Snapshot {
        path: path.to_path_buf(),
        bytes: cache.raw_bytes(path)?,
    });
    Ok(())
}

/// Best effort: failures are logged, never raised over the original error
fn rollback(cache: &mut FileCache, snapshots: &[Snapshot], touched: &[PathBuf]) {
    for snapshot in snapshots {
        if !touched.contains(&snapshot.path) {
            continue;
        }
        if let Err(err) = cache.restore_bytes(&snapshot.path, snapshot.bytes.as_deref()) {
            error!(
                path = %snapshot.path.display(),
                error = %err,
                "rollback failed; file may not match its pre-batch state"
            );
        }
    }
}

/// Adapt a typed mutation into an `update` closure body
///
/// ```
/// # use tasktracker::batch::edit;
/// # use tasktracker::task::TaskCollection;
/// let value = serde_json::json!({ "lastId": 3, "tasks": [] });
/// let next = edit::<TaskCollection, _>(value, |collection| {
///     collection.last_id += 1;
///     Ok(())
/// })
/// .unwrap();
/// assert_eq!(next["lastId"], 4);
/// ```
pub fn edit<T, F>(value: Value, f: F) -> Result<Value>
where
    T: DeserializeOwned + Serialize,
    F: FnOnce(&mut T) -> Result<()>,
{
    let mut typed: T = serde_json::from_value(value).map_err(Error::Json)?;
    f(&mut typed)?;
    Ok(serde_json::to_value(&typed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn seed(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
        let path = dir.path().join(name);
        let mut cache = FileCache::new();
        cache.write(&path, value, WriteOptions::forced()).unwrap();
        path
    }

    #[test]
    fn reads_fill_slots_without_writing() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir, "a.json", &json!({"n": 1}));
        let before = fs::read(&path).unwrap();

        let mut cache = FileCache::new();
        let outcome = Batch::new().read(&path).execute(&mut cache).unwrap();
        assert_eq!(outcome.read(&path), Some(&json!({"n": 1})));
        assert!(outcome.written.is_empty());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn updates_and_writes_land_together() {
        let dir = TempDir::new().unwrap();
        let a = seed(&dir, "a.json", &json!({"n": 1}));
        let b = dir.path().join("b.json");

        let mut cache = FileCache::new();
        let outcome = Batch::new()
            .update(&a, |mut value| {
                value["n"] = json!(2);
                Ok(value)
            })
            .write(&b, json!({"fresh": true}))
            .execute(&mut cache)
            .unwrap();

        assert_eq!(outcome.written, vec![a.clone(), b.clone()]);
        let a_value: Value = serde_json::from_slice(&fs::read(&a).unwrap()).unwrap();
        assert_eq!(a_value["n"], 2);
        assert!(b.exists());
    }

    #[test]
    fn chained_updates_see_previous_result() {
        let dir = TempDir::new().unwrap();
        let a = seed(&dir, "a.json", &json!({"n": 1}));

        let mut cache = FileCache::new();
        Batch::new()
            .update(&a, |mut value| {
                value["n"] = json!(value["n"].as_i64().unwrap_or(0) + 1);
                Ok(value)
            })
            .update(&a, |mut value| {
                value["n"] = json!(value["n"].as_i64().unwrap_or(0) * 10);
                Ok(value)
            })
            .execute(&mut cache)
            .unwrap();

        let a_value: Value = serde_json::from_slice(&fs::read(&a).unwrap()).unwrap();
        assert_eq!(a_value["n"], 20);
    }

    #[test]
    fn failing_update_aborts_before_any_write() {
        let dir = TempDir::new().unwrap();
        let a = seed(&dir, "a.json", &json!({"n": 1}));
        let before = fs::read(&a).unwrap();

        let mut cache = FileCache::new();
        let err = Batch::new()
            .write(&a, json!({"n": 99}))
            .update(&a, |_| Err(Error::validation("n", "refused")))
            .execute(&mut cache)
            .unwrap_err();

        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(fs::read(&a).unwrap(), before);
    }

    #[test]
    fn update_of_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut cache = FileCache::new();
        let err = Batch::new()
            .update(dir.path().join("missing.json"), Ok)
            .execute(&mut cache)
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn update_or_init_starts_from_initial_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.json");

        let mut cache = FileCache::new();
        Batch::new()
            .update_or_init(&path, json!({"items": []}), |mut value| {
                value["items"] = json!([1]);
                Ok(value)
            })
            .execute(&mut cache)
            .unwrap();

        let value: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value, json!({"items": [1]}));
    }

    #[test]
    fn rolled_back_init_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let a = seed(&dir, "a.json", &json!({"n": 1}));
        let fresh = dir.path().join("fresh.json");
        fs::create_dir(dir.path().join("fresh.json.tmp")).unwrap();
        let a_before = fs::read(&a).unwrap();

        let mut cache = FileCache::new();
        let err = Batch::new()
            .write(&a, json!({"n": 2}))
            .update_or_init(&fresh, json!({}), Ok)
            .execute(&mut cache)
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(fs::read(&a).unwrap(), a_before);
        assert!(!fresh.exists());
    }

    #[test]
    fn failed_write_restores_earlier_files() {
        let dir = TempDir::new().unwrap();
        let a = seed(&dir, "a.json", &json!({"n": 1}));
        let b = seed(&dir, "b.json", &json!({"n": 2}));
        let created = dir.path().join("created.json");
        // A directory on the staging path makes the last write fail before rename.
        fs::create_dir(dir.path().join("c.json.tmp")).unwrap();
        let a_before = fs::read(&a).unwrap();
        let b_before = fs::read(&b).unwrap();

        let mut cache = FileCache::new();
        let err = Batch::new()
            .write(&a, json!({"n": 10}))
            .update(&b, |mut value| {
                value["n"] = json!(20);
                Ok(value)
            })
            .write(&created, json!({}))
            .write(dir.path().join("c.json"), json!({"n": 3}))
            .execute(&mut cache)
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(fs::read(&a).unwrap(), a_before);
        assert_eq!(fs::read(&b).unwrap(), b_before);
        assert!(!created.exists());

        // The cache must not keep serving the rolled-back values.
        let a_value = cache.read_value(&a, Duration::from_secs(60)).unwrap();
        assert_eq!(a_value["n"], 1);
    }

    #[test]
    fn edit_rejects_wrong_shape() {
        #[derive(serde::Deserialize, Serialize)]
        struct Counter {
            n: u32,
        }
        let err = edit::<Counter, _>(json!({"n": "x"}), |_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
