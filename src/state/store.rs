// State store: load/save for the manifest document
//
// Saves are optimistic: each save checks, under an exclusive file lock, that
// the document on disk is still at the revision the caller loaded. A caller
// holding a stale copy gets a WriteConflict instead of silently erasing
// whatever was appended in between.

use fs2::FileExt;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::error::StoreError;
use super::{ManifestState, StateConfig};

/// Attempts made by [`StateStore::update`] before giving up on conflicts.
const UPDATE_ATTEMPTS: usize = 3;

/// Load/save access to the persisted document.
pub trait StateStore {
    /// Read the full document. A missing document is an error, never an
    /// empty default.
    fn load(&self) -> Result<ManifestState, StoreError>;

    /// Write the document back. Fails with `WriteConflict` if the store has
    /// moved past `state.revision`; on success `state.revision` is bumped.
    fn save(&self, state: &mut ManifestState) -> Result<(), StoreError>;

    /// Load, mutate and save in one step, reloading and re-applying the
    /// mutation if another writer got in first.
    fn update<T, F>(&self, mut mutate: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnMut(&mut ManifestState) -> T,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut state = self.load()?;
            let out = mutate(&mut state);
            match self.save(&mut state) {
                Ok(()) => return Ok(out),
                Err(e) if e.is_conflict() && attempt < UPDATE_ATTEMPTS => {
                    warn!("State update conflicted (attempt {}), reloading: {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// The manifest stored as pretty-printed JSON on the local filesystem.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

#[derive(Deserialize)]
struct RevisionStamp {
    #[serde(default)]
    revision: u64,
}

impl JsonFileStore {
    /// Open an existing document location. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a fresh document. Refuses to overwrite an existing one.
    pub fn init(path: impl Into<PathBuf>, config: StateConfig) -> Result<Self, StoreError> {
        let store = Self::new(path);
        if store.path.exists() {
            return Err(StoreError::AlreadyExists {
                path: store.path.clone(),
            });
        }
        if let Some(parent) = store.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let _lock = store.lock()?;
        let state = ManifestState::new(config);
        store.write_atomic(&state)?;
        tracing::info!("Initialized state document at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file next to the document (graveyard, lock file, ...).
    pub fn sibling(&self, file_name: &str) -> PathBuf {
        self.path
            .parent()
            .map(|p| p.join(file_name))
            .unwrap_or_else(|| PathBuf::from(file_name))
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn lock(&self) -> Result<File, StoreError> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StoreError::Lock {
                path: lock_path.clone(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| StoreError::Lock {
            path: lock_path,
            source,
        })?;
        Ok(file)
    }

    fn read_contents(&self) -> Result<String, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::NotFound {
                path: self.path.clone(),
            });
        }
        fs::read_to_string(&self.path).map_err(|source| StoreError::Unreadable {
            path: self.path.clone(),
            source,
        })
    }

    fn write_atomic(&self, state: &ManifestState) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(state).map_err(StoreError::Serialize)?;
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let io_err = |source: std::io::Error| StoreError::Io {
            path: tmp_path.clone(),
            source,
        };
        let mut file = File::create(&tmp_path).map_err(io_err)?;
        file.write_all(contents.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<ManifestState, StoreError> {
        let contents = self.read_contents()?;
        let state: ManifestState =
            serde_json::from_str(&contents).map_err(|source| StoreError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            "Loaded state revision {} ({} queued, {} artifacts)",
            state.revision,
            state.task_queue.len(),
            state.artifacts.len()
        );
        Ok(state)
    }

    fn save(&self, state: &mut ManifestState) -> Result<(), StoreError> {
        let lock = self.lock()?;

        let on_disk: RevisionStamp =
            serde_json::from_str(&self.read_contents()?).map_err(|source| {
                StoreError::Malformed {
                    path: self.path.clone(),
                    source,
                }
            })?;
        if on_disk.revision != state.revision {
            return Err(StoreError::WriteConflict {
                expected: state.revision,
                found: on_disk.revision,
            });
        }

        state.revision += 1;
        if let Err(e) = self.write_atomic(state) {
            state.revision -= 1;
            return Err(e);
        }
        debug!("Saved state revision {}", state.revision);

        FileExt::unlock(&lock).map_err(|source| StoreError::Lock {
            path: self.lock_path(),
            source,
        })
    }
}
