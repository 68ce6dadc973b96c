//! Key-value persistence backends for the settings record.
//!
//! The settings live in a single record under one key. [`FileStore`] keeps
//! each record in its own JSON file; [`MemoryStore`] keeps them in process
//! memory and is what tests and `--ephemeral` runs use.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::{SettingsError, paths};

/// A durable string-valued key-value store.
///
/// Implementations must be `Send + Sync` so a session can be moved into
/// spawned tasks.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// Stores each record as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on
    /// the first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a store rooted at [`paths::data_dir`].
    #[must_use]
    pub fn in_data_dir() -> Self {
        Self::new(paths::data_dir())
    }

    /// Returns the directory this store writes to.
    #[must_use]
    pub const fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let path = paths::record_path(&self.dir, key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        paths::ensure_dir(&self.dir)?;
        let path = paths::record_path(&self.dir, key);
        // Write-then-rename so a crash never leaves a truncated record.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        log::debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let records = self.records.lock().map_err(|_| SettingsError::Poisoned)?;
        Ok(records.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut records = self.records.lock().map_err(|_| SettingsError::Poisoned)?;
        records.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
