//! store::file
//!
//! JSON state file persistence.
//!
//! # Architecture
//!
//! The whole store (catalog, roster, ledger, id counters) is serialized as a
//! single [`Snapshot`] document. A process that wants to mutate it opens the
//! file through [`StateFile::open`], which takes an OS-level exclusive lock
//! on a sidecar `<state>.lock` file via `fs2` before reading. The lock is
//! held by the returned [`LockedState`] for the whole load, mutate, save
//! cycle, so two processes can never interleave their read-modify-write.
//!
//! # Storage
//!
//! - `<state>` - Snapshot JSON
//! - `<state>.lock` - Lock file with OS-level exclusive lock
//! - `<state>.tmp` - Temporary file used for atomic replace
//!
//! # Invariants
//!
//! - The lock is acquired before the state is read
//! - Saves are atomic: write temp file, fsync, rename
//! - Lock acquisition is non-blocking (fails fast if locked)
//! - Lock is automatically released on drop (RAII pattern)
//!
//! # Example
//!
//! ```ignore
//! use registrar::store::file::StateFile;
//!
//! let state = StateFile::new("registrar.json");
//! let locked = state.open()?;
//! locked.store().add_department("History")?;
//! locked.save()?;
//! // lock released on drop
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use super::memory::{MemoryStore, Snapshot};
use super::StoreError;

/// Errors from state file operations.
#[derive(Debug, Error)]
pub enum StateFileError {
    /// Another process holds the state file lock.
    #[error("state file '{0}' is locked by another process")]
    AlreadyLocked(PathBuf),

    /// The state file does not exist yet.
    #[error("state file '{0}' not found (run `reg init` first)")]
    NotInitialized(PathBuf),

    /// Refusing to overwrite an existing state file.
    #[error("state file '{0}' already exists")]
    AlreadyExists(PathBuf),

    /// JSON serialization/deserialization error.
    #[error("state file '{path}' is not valid: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The snapshot parsed but violates a constraint.
    #[error("state file '{path}' is inconsistent: {source}")]
    Store { path: PathBuf, source: StoreError },

    /// I/O error.
    #[error("state file i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A state file location.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sidecar lock file.
    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    /// Create an empty state file.
    ///
    /// # Errors
    ///
    /// Returns `StateFileError::AlreadyExists` unless `force` is set.
    pub fn init(&self, force: bool) -> Result<LockedState, StateFileError> {
        let lock_file = self.lock()?;
        if self.path.exists() && !force {
            return Err(StateFileError::AlreadyExists(self.path.clone()));
        }
        let locked = LockedState {
            path: self.path.clone(),
            lock_file: Some(lock_file),
            store: MemoryStore::new(),
        };
        locked.save()?;
        Ok(locked)
    }

    /// Lock and load the state file.
    pub fn open(&self) -> Result<LockedState, StateFileError> {
        let lock_file = self.lock()?;
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateFileError::NotInitialized(self.path.clone()))
            }
            Err(e) => {
                return Err(StateFileError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        let snapshot: Snapshot =
            serde_json::from_str(&contents).map_err(|e| StateFileError::Json {
                path: self.path.clone(),
                source: e,
            })?;
        let store = MemoryStore::from_snapshot(snapshot).map_err(|e| StateFileError::Store {
            path: self.path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %self.path.display(), "loaded state file");
        Ok(LockedState {
            path: self.path.clone(),
            lock_file: Some(lock_file),
            store,
        })
    }

    fn lock(&self) -> Result<File, StateFileError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StateFileError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StateFileError::Io {
                path: lock_path.clone(),
                source: e,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(StateFileError::AlreadyLocked(self.path.clone()))
            }
            Err(e) => Err(StateFileError::Io {
                path: lock_path,
                source: e,
            }),
        }
    }
}

/// A loaded store holding the state file lock.
#[derive(Debug)]
pub struct LockedState {
    path: PathBuf,
    lock_file: Option<File>,
    store: MemoryStore,
}

impl LockedState {
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Write the current store back to disk atomically.
    pub fn save(&self) -> Result<(), StateFileError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StateFileError::Io { path, source }
        };

        let json = serde_json::to_string_pretty(&self.store.snapshot()).map_err(|e| {
            StateFileError::Json {
                path: self.path.clone(),
                source: e,
            }
        })?;

        let temp_path = sibling(&self.path, "tmp");
        let mut file = File::create(&temp_path).map_err(io_err(&temp_path))?;
        file.write_all(json.as_bytes())
            .map_err(io_err(&temp_path))?;
        file.sync_all().map_err(io_err(&temp_path))?;
        fs::rename(&temp_path, &self.path).map_err(io_err(&self.path))?;

        tracing::debug!(path = %self.path.display(), bytes = json.len(), "saved state file");
        Ok(())
    }

    /// Check if the lock is still held.
    pub fn is_held(&self) -> bool {
        self.lock_file.is_some()
    }

    /// Release the lock explicitly. Safe to call more than once.
    pub fn release(&mut self) -> Result<(), StateFileError> {
        if let Some(file) = self.lock_file.take() {
            file.unlock().map_err(|e| StateFileError::Io {
                path: sibling(&self.path, "lock"),
                source: e,
            })?;
        }
        Ok(())
    }
}

impl Drop for LockedState {
    fn drop(&mut self) {
        // Best-effort release on drop
        if let Some(file) = self.lock_file.take() {
            let _ = file.unlock();
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state_in(dir: &TempDir) -> StateFile {
        StateFile::new(dir.path().join("state.json"))
    }

    #[test]
    fn open_before_init_reports_not_initialized() {
        let temp = TempDir::new().unwrap();
        let result = state_in(&temp).open();
        assert!(matches!(result, Err(StateFileError::NotInitialized(_))));
    }

    #[test]
    fn init_then_open_round_trips() {
        let temp = TempDir::new().unwrap();
        let state = state_in(&temp);
        {
            let locked = state.init(false).unwrap();
            locked.store().add_department("History").unwrap();
            locked.save().unwrap();
        }
        let locked = state.open().unwrap();
        let names: Vec<String> = locked
            .store()
            .read_catalog(|c, _| c.departments().map(|d| d.name.clone()).collect());
        assert_eq!(names, vec!["History".to_string()]);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let temp = TempDir::new().unwrap();
        let state = state_in(&temp);
        drop(state.init(false).unwrap());
        assert!(matches!(
            state.init(false),
            Err(StateFileError::AlreadyExists(_))
        ));
        assert!(state.init(true).is_ok());
    }

    #[test]
    fn second_open_is_locked_out() {
        let temp = TempDir::new().unwrap();
        let state = state_in(&temp);
        let first = state.init(false).unwrap();
        assert!(first.is_held());

        assert!(matches!(
            state.open(),
            Err(StateFileError::AlreadyLocked(_))
        ));
        drop(first);
        assert!(state.open().is_ok());
    }

    #[test]
    fn explicit_release_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut locked = state_in(&temp).init(false).unwrap();
        locked.release().unwrap();
        locked.release().unwrap();
        assert!(!locked.is_held());
    }

    #[test]
    fn garbage_file_reports_json_error() {
        let temp = TempDir::new().unwrap();
        let state = state_in(&temp);
        fs::write(state.path(), "{ nope").unwrap();
        assert!(matches!(state.open(), Err(StateFileError::Json { .. })));
    }

    #[test]
    fn lock_path_is_sidecar() {
        let state = StateFile::new("/tmp/reg/state.json");
        assert_eq!(state.lock_path(), PathBuf::from("/tmp/reg/state.json.lock"));
    }
}
