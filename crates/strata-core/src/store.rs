//! Persistence boundary for browser-persisted layers.
//!
//! A store is write-through key-value storage of opaque strings. Absence of a
//! key (`None`) is distinct from a present empty value (`Some("")`).

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::ErrorCode;
use crate::lock::{LockError, LockMode, StoreLock};

/// Default time to wait for another process to release a store directory.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

const LOCK_FILE: &str = ".lock";

/// Errors raised by a [`BrowserStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot read browser store at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write browser store at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl StoreError {
    fn read(path: &Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write(path: &Path, source: io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::StoreReadFailed,
            Self::Write { .. } => ErrorCode::StoreWriteFailed,
            Self::Lock(err) => err.code(),
        }
    }
}

/// Key-value storage owned by one browser profile.
pub trait BrowserStore {
    /// Stored value for `key`, or `None` when nothing was ever stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`; returns whether a value was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Read-modify-write of `key` that no other writer can interleave with.
    ///
    /// `apply` sees the current value and returns the replacement, or `None`
    /// to leave the key as it is. It runs exactly once when this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or written.
    fn update(
        &mut self,
        key: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Option<String>,
    ) -> Result<(), StoreError>;
}

/// In-process store, used by tests and single-process hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BrowserStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn update(
        &mut self,
        key: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Option<String>,
    ) -> Result<(), StoreError> {
        if let Some(next) = apply(self.entries.get(key).map(String::as_str)) {
            self.entries.insert(key.to_string(), next);
        }
        Ok(())
    }
}

/// One file per key under a profile directory.
///
/// Reads take a shared lock on `<root>/.lock`. Every write happens inside a
/// [`StoreTransaction`], which holds the exclusive lock, and lands through a
/// temporary sibling renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Store for the named profile under `storage_dir`.
    ///
    /// Distinct profile names always map to distinct directories.
    #[must_use]
    pub fn for_profile(storage_dir: &Path, profile: &str) -> Self {
        Self::new(storage_dir.join(encode_component(profile)))
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_component(key)))
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Take the directory's exclusive lock for a sequence of reads and writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the lock is not
    /// released within the configured timeout.
    pub fn transaction(&self) -> Result<StoreTransaction<'_>, StoreError> {
        fs::create_dir_all(&self.root).map_err(|err| StoreError::write(&self.root, err))?;
        let lock = StoreLock::acquire(&self.lock_path(), LockMode::Exclusive, self.lock_timeout)?;
        Ok(StoreTransaction { store: self, _lock: lock })
    }
}

impl BrowserStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if !self.root.exists() {
            return Ok(None);
        }
        let _lock = StoreLock::acquire(&self.lock_path(), LockMode::Shared, self.lock_timeout)?;
        read_value(&self.path_for(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.transaction()?.write(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        if !self.root.exists() {
            return Ok(false);
        }
        self.transaction()?.remove(key)
    }

    fn update(
        &mut self,
        key: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Option<String>,
    ) -> Result<(), StoreError> {
        let txn = self.transaction()?;
        let current = txn.read(key)?;
        match apply(current.as_deref()) {
            Some(next) => txn.write(key, &next),
            None => Ok(()),
        }
    }
}

/// Exclusive access to a [`FileStore`] directory; released on drop.
#[derive(Debug)]
pub struct StoreTransaction<'a> {
    store: &'a FileStore,
    _lock: StoreLock,
}

impl StoreTransaction<'_> {
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        read_value(&self.store.path_for(key))
    }

    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or renamed.
    pub fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.store.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|err| StoreError::write(&tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| StoreError::write(&path, err))?;
        debug!(key, path = %path.display(), bytes = value.len(), "stored browser value");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be deleted.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.store.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::write(&path, err)),
        }
    }
}

fn read_value(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StoreError::read(path, err)),
    }
}

/// Encode an arbitrary key as one path component, reversibly.
///
/// `[A-Za-z0-9_-]` pass through; every other byte becomes `%XX`. The empty
/// key is `%`, which no non-empty key encodes to.
fn encode_component(key: &str) -> String {
    if key.is_empty() {
        return "%".to_string();
    }
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}
