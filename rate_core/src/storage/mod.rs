//! # Key-Value Storage
//!
//! The persistence medium is a plain string key-value store with read,
//! write and clear. [`crate::session::Session`] keeps the whole document in
//! four keys and rewrites them on every change.
//!
//! - [`MemoryStore`] - in-process map, for tests and embedding
//! - [`FileStore`] - JSON file with atomic saves and an OS write lock
//!
//! ## Example
//!
//! ```rust
//! use rate_core::storage::{KeyValueStore, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! store.write("theme", "dark")?;
//! assert_eq!(store.read("theme")?.as_deref(), Some("dark"));
//!
//! store.clear("theme")?;
//! assert_eq!(store.read("theme")?, None);
//! # Ok::<(), rate_core::errors::RateError>(())
//! ```

#[cfg(not(target_arch = "wasm32"))]
pub mod file;

use std::collections::BTreeMap;

use crate::errors::RateResult;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

/// Key holding the JSON panel list
pub const PANELS_KEY: &str = "panels";

/// Key holding the schema version of [`PANELS_KEY`]
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";

/// Key holding `"dark"` or `"light"`
pub const THEME_KEY: &str = "theme";

/// Key holding the UI scale factor
pub const UI_SCALE_KEY: &str = "uiScale";

/// Every key the session writes
pub const ALL_KEYS: [&str; 4] = [PANELS_KEY, SCHEMA_VERSION_KEY, THEME_KEY, UI_SCALE_KEY];

/// A string key-value store.
pub trait KeyValueStore {
    /// Read a value; `None` when the key was never written or was cleared.
    fn read(&self, key: &str) -> RateResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn write(&mut self, key: &str, value: &str) -> RateResult<()>;

    /// Remove a key. Clearing a missing key is not an error.
    fn clear(&mut self, key: &str) -> RateResult<()>;

    /// Write several values as one save.
    ///
    /// The default writes them one by one; stores with an expensive commit
    /// override it to commit once.
    fn write_batch(&mut self, entries: &[(&str, String)]) -> RateResult<()> {
        for (key, value) in entries {
            self.write(key, value)?;
        }
        Ok(())
    }

    /// Remove several keys as one save. Same default and override rule as
    /// [`KeyValueStore::write_batch`].
    fn clear_batch(&mut self, keys: &[&str]) -> RateResult<()> {
        for key in keys {
            self.clear(key)?;
        }
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// A store pre-filled with entries, e.g. a document from an older version.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        MemoryStore {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> RateResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> RateResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self, key: &str) -> RateResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
