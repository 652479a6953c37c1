//! # File Store
//!
//! A [`KeyValueStore`] backed by one JSON file:
//!
//! ```json
//! {
//!   "saved_at": "2026-10-18T09:30:00Z",
//!   "entries": { "panels": "[...]", "schemaVersion": "3", "theme": "light", "uiScale": "1" }
//! }
//! ```
//!
//! Safety features:
//! - **Atomic saves**: write `<file>.tmp`, fsync, rename over the file
//! - **Write lock**: an exclusive OS lock on `<file>.lock` (via fs2) is held
//!   for the duration of each save; the lock file records the holder's pid,
//!   machine and lock time so a blocked writer can say who holds it
//!
//! ## Example
//!
//! ```rust,no_run
//! use rate_core::storage::{FileStore, KeyValueStore};
//!
//! let mut store = FileStore::open("ratecalc.json")?;
//! store.write("theme", "dark")?;
//! # Ok::<(), rate_core::errors::RateError>(())
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::KeyValueStore;
use crate::errors::{RateError, RateResult};

/// On-disk layout of the store file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    /// When the file was last written
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Lock file metadata stored in `<file>.lock`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Machine name where lock was acquired
    pub machine: String,
    /// Process ID that holds the lock
    pub pid: u32,
    /// When the lock was acquired
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    /// Create lock info for the current process
    pub fn current() -> Self {
        LockInfo {
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }
}

/// Get the hostname of the current machine
fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::env::var("HOST").ok())
    }
}

/// `<dir>/<name><suffix>` next to `path`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Exclusive write lock, released when dropped.
struct StoreLock {
    lock_path: PathBuf,
    /// Keeps the OS lock alive
    _lock_file: File,
}

impl StoreLock {
    fn acquire(store_path: &Path) -> RateResult<Self> {
        let lock_path = sibling_path(store_path, ".lock");

        let mut lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| RateError::storage("create lock", lock_path.display().to_string(), e.to_string()))?;

        if lock_file.try_lock_exclusive().is_err() {
            let holder = read_lock_info(&mut lock_file);
            return Err(RateError::StoreLocked {
                path: store_path.display().to_string(),
                locked_by: holder
                    .as_ref()
                    .map(|h| format!("pid {} on {}", h.pid, h.machine))
                    .unwrap_or_else(|| "another process".to_string()),
                locked_at: holder
                    .map(|h| h.locked_at.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }

        let info = serde_json::to_string_pretty(&LockInfo::current())?;
        lock_file
            .set_len(0)
            .and_then(|_| lock_file.write_all(info.as_bytes()))
            .map_err(|e| RateError::storage("write lock", lock_path.display().to_string(), e.to_string()))?;

        Ok(StoreLock {
            lock_path,
            _lock_file: lock_file,
        })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // OS lock is released when _lock_file is dropped
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn read_lock_info(file: &mut File) -> Option<LockInfo> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Key-value store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    contents: StoreFile,
}

impl FileStore {
    /// Open a store file, starting empty if it does not exist yet.
    ///
    /// # Returns
    ///
    /// * `Ok(FileStore)` - File loaded (or absent)
    /// * `Err(RateError::SerializationError)` - File exists but is not a store
    /// * `Err(RateError::StorageError)` - I/O error
    pub fn open(path: impl Into<PathBuf>) -> RateResult<Self> {
        let path = path.into();
        if !path.exists() {
            log::debug!("Store file {} not found, starting empty", path.display());
            return Ok(FileStore {
                path,
                contents: StoreFile::default(),
            });
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| RateError::storage("read", path.display().to_string(), e.to_string()))?;
        let contents: StoreFile = serde_json::from_str(&contents).map_err(|e| RateError::SerializationError {
            reason: format!("Invalid store file {}: {}", path.display(), e),
        })?;

        Ok(FileStore { path, contents })
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the file was last written, if ever
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.contents.saved_at
    }

    /// Apply `change` to a copy of the entries and keep it once it is on disk.
    ///
    /// A failed save leaves the in-memory contents as they were.
    fn commit(&mut self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> RateResult<()> {
        let mut next = self.contents.clone();
        change(&mut next.entries);
        next.saved_at = Some(Utc::now());
        self.persist(&next)?;
        self.contents = next;
        Ok(())
    }

    /// Write the whole file atomically under the write lock.
    fn persist(&self, contents: &StoreFile) -> RateResult<()> {
        let _lock = StoreLock::acquire(&self.path)?;

        let json = serde_json::to_string_pretty(contents)?;

        let tmp_path = sibling_path(&self.path, ".tmp");
        let mut tmp_file = File::create(&tmp_path).map_err(|e| {
            RateError::storage("create temp file", tmp_path.display().to_string(), e.to_string())
        })?;

        tmp_file.write_all(json.as_bytes()).map_err(|e| {
            RateError::storage("write temp file", tmp_path.display().to_string(), e.to_string())
        })?;

        tmp_file.sync_all().map_err(|e| {
            RateError::storage("sync temp file", tmp_path.display().to_string(), e.to_string())
        })?;

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            RateError::storage("rename to final", self.path.display().to_string(), e.to_string())
        })?;

        log::debug!("Saved {} key(s) to {}", contents.entries.len(), self.path.display());
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> RateResult<Option<String>> {
        Ok(self.contents.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> RateResult<()> {
        self.commit(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn clear(&mut self, key: &str) -> RateResult<()> {
        self.clear_batch(&[key])
    }

    fn write_batch(&mut self, entries: &[(&str, String)]) -> RateResult<()> {
        self.commit(|stored| {
            for (key, value) in entries {
                stored.insert(key.to_string(), value.clone());
            }
        })
    }

    fn clear_batch(&mut self, keys: &[&str]) -> RateResult<()> {
        if !keys.iter().any(|key| self.contents.entries.contains_key(*key)) {
            return Ok(());
        }
        self.commit(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}
