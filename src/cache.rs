//! Whole-file JSON cache
//!
//! Each store instance keeps one [`FileCache`]. Entries remember the parsed
//! value, the raw bytes and their SHA-256 so that:
//! - repeated reads inside the TTL do not touch disk
//! - writes whose serialization hashes identically to the cached bytes are
//!   skipped entirely
//!
//! The cache is never shared between processes; staleness only matters
//! inside one long-lived instance, which is what the TTL bounds.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::atomic;
use crate::error::{Error, Result};

/// Default freshness window for cached reads
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    raw: Vec<u8>,
    hash: String,
    read_at: Instant,
}

/// Options controlling a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip the write when the new bytes hash identically to the cached bytes
    pub only_if_changed: bool,
    /// Stage to `<path>.tmp` and rename over the target
    pub atomic: bool,
}

impl WriteOptions {
    /// Always write, always atomically
    pub fn forced() -> Self {
        Self {
            only_if_changed: false,
            atomic: true,
        }
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            only_if_changed: true,
            atomic: true,
        }
    }
}

/// What a write actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct FileCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a file as untyped JSON, serving from cache while younger than `ttl`
    pub fn read_value(&mut self, path: &Path, ttl: Duration) -> Result<Value> {
        if let Some(entry) = self.entries.get(path) {
            if entry.read_at.elapsed() < ttl {
                debug!(path = %path.display(), "cache hit");
                return Ok(entry.value.clone());
            }
        }

        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.entries.remove(path);
                return Err(Error::FileNotFound(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };

        let value: Value = serde_json::from_slice(&raw).map_err(|err| Error::CorruptData {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let hash = content_hash(&raw);
        debug!(path = %path.display(), hash = %hash, "loaded from disk");
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                value: value.clone(),
                raw,
                hash,
                read_at: Instant::now(),
            },
        );
        Ok(value)
    }

    /// Read and deserialize a file; a shape mismatch counts as corrupt data
    pub fn read<T: DeserializeOwned>(&mut self, path: &Path, ttl: Duration) -> Result<T> {
        let value = self.read_value(path, ttl)?;
        serde_json::from_value(value).map_err(|err| Error::CorruptData {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    /// Like [`FileCache::read`], but a missing file yields `T::default()`
    ///
    /// Nothing is written; the file appears on the first real write.
    pub fn read_or_init<T: DeserializeOwned + Default>(
        &mut self,
        path: &Path,
        ttl: Duration,
    ) -> Result<T> {
        match self.read(path, ttl) {
            Ok(value) => Ok(value),
            Err(Error::FileNotFound(_)) => Ok(T::default()),
            Err(err) => Err(err),
        }
    }

    pub fn write<T: Serialize + ?Sized>(
        &mut self,
        path: &Path,
        record: &T,
        options: WriteOptions,
    ) -> Result<WriteOutcome> {
        let mut raw = serde_json::to_vec_pretty(record)?;
        raw.push(b'\n');
        let hash = content_hash(&raw);

        if options.only_if_changed && self.current_hash(path)?.as_deref() == Some(hash.as_str()) {
            debug!(path = %path.display(), "content unchanged, write skipped");
            return Ok(WriteOutcome::Unchanged);
        }

        if options.atomic {
            atomic::write_atomic(path, &raw)?;
        } else {
            atomic::write_direct(path, &raw)?;
        }

        let value = serde_json::to_value(record)?;
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                value,
                raw,
                hash,
                read_at: Instant::now(),
            },
        );
        Ok(WriteOutcome::Written)
    }

    /// Current on-disk bytes of `path`, bypassing the cache
    pub fn raw_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Force `path` back to exact prior bytes, or remove it if it had none
    pub fn restore_bytes(&mut self, path: &Path, bytes: Option<&[u8]>) -> Result<()> {
        self.entries.remove(path);
        match bytes {
            Some(bytes) => atomic::write_atomic(path, bytes),
            None => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Drop one entry, or every entry when `path` is `None`
    pub fn invalidate(&mut self, path: Option<&Path>) {
        match path {
            Some(path) => {
                self.entries.remove(path);
            }
            None => self.entries.clear(),
        }
    }

    fn current_hash(&self, path: &Path) -> Result<Option<String>> {
        if let Some(entry) = self.entries.get(path) {
            return Ok(Some(entry.hash.clone()));
        }
        Ok(self.raw_bytes(path)?.map(|raw| content_hash(&raw)))
    }
}

/// Lowercase hex SHA-256 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        count: u32,
    }

    const LONG: Duration = Duration::from_secs(60);

    fn cached_bytes<'a>(cache: &'a FileCache, path: &Path) -> Option<&'a [u8]> {
        cache.entries.get(path).map(|entry| entry.raw.as_slice())
    }

    fn cached_hash<'a>(cache: &'a FileCache, path: &Path) -> Option<&'a str> {
        cache.entries.get(path).map(|entry| entry.hash.as_str())
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut cache = FileCache::new();
        let err = cache
            .read::<Record>(&dir.path().join("missing.json"), LONG)
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));

        let record: Record = cache
            .read_or_init(&dir.path().join("missing.json"), LONG)
            .unwrap();
        assert_eq!(record, Record::default());
        assert!(!dir.path().join("missing.json").exists());
    }

    #[test]
    fn reads_are_served_from_cache_within_ttl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{\"count\": 1}").unwrap();

        let mut cache = FileCache::new();
        assert_eq!(cache.read::<Record>(&path, LONG).unwrap().count, 1);

        fs::write(&path, "{\"count\": 2}").unwrap();
        assert_eq!(cache.read::<Record>(&path, LONG).unwrap().count, 1);
        assert_eq!(cache.read::<Record>(&path, Duration::ZERO).unwrap().count, 2);
    }

    #[test]
    fn invalidate_forces_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{\"count\": 1}").unwrap();

        let mut cache = FileCache::new();
        cache.read::<Record>(&path, LONG).unwrap();
        fs::write(&path, "{\"count\": 3}").unwrap();

        cache.invalidate(Some(&path));
        assert_eq!(cache.read::<Record>(&path, LONG).unwrap().count, 3);

        fs::write(&path, "{\"count\": 4}").unwrap();
        cache.invalidate(None);
        assert_eq!(cache.read::<Record>(&path, LONG).unwrap().count, 4);
    }

    #[test]
    fn unchanged_write_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let mut cache = FileCache::new();

        let outcome = cache
            .write(&path, &Record { count: 5 }, WriteOptions::default())
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written);

        // Tamper behind the cache's back: a skipped write must not touch disk.
        fs::write(&path, "external").unwrap();
        let outcome = cache
            .write(&path, &Record { count: 5 }, WriteOptions::default())
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert_eq!(fs::read_to_string(&path).unwrap(), "external");

        let outcome = cache
            .write(&path, &Record { count: 5 }, WriteOptions::forced())
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(cache.read::<Record>(&path, Duration::ZERO).unwrap().count, 5);
    }

    #[test]
    fn uncached_write_compares_against_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let mut writer = FileCache::new();
        writer
            .write(&path, &Record { count: 9 }, WriteOptions::default())
            .unwrap();

        let mut fresh = FileCache::new();
        let outcome = fresh
            .write(&path, &Record { count: 9 }, WriteOptions::default())
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
    }

    #[test]
    fn write_updates_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let mut cache = FileCache::new();
        cache
            .write(&path, &Record { count: 1 }, WriteOptions::default())
            .unwrap();
        let first = cached_hash(&cache, &path).unwrap().to_string();
        let on_disk = fs::read(&path).unwrap();
        assert_eq!(first, content_hash(&on_disk));
        assert_eq!(cached_bytes(&cache, &path).unwrap(), on_disk.as_slice());

        cache
            .write(&path, &Record { count: 2 }, WriteOptions::default())
            .unwrap();
        assert_ne!(cached_hash(&cache, &path).unwrap(), first);
    }

    #[test]
    fn unparseable_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{not json").unwrap();

        let mut cache = FileCache::new();
        let err = cache.read::<Record>(&path, LONG).unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }));

        fs::write(&path, "{\"count\": \"many\"}").unwrap();
        let err = cache.read::<Record>(&path, Duration::ZERO).unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }));
    }

    #[test]
    fn non_atomic_write_lands_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let mut cache = FileCache::new();
        let options = WriteOptions {
            only_if_changed: false,
            atomic: false,
        };
        cache.write(&path, &Record { count: 7 }, options).unwrap();
        assert_eq!(cache.read::<Record>(&path, Duration::ZERO).unwrap().count, 7);
        assert!(!atomic::temp_path(&path).exists());
    }

    #[test]
    fn restore_bytes_removes_new_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let mut cache = FileCache::new();
        cache
            .write(&path, &Record { count: 1 }, WriteOptions::default())
            .unwrap();

        cache.restore_bytes(&path, None).unwrap();
        assert!(!path.exists());
        assert!(cached_hash(&cache, &path).is_none());

        cache.restore_bytes(&path, Some(b"{\"count\": 8}")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{\"count\": 8}");
    }
}
