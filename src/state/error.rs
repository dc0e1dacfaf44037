// State store error kinds

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist. Never answered by fabricating an empty one.
    #[error("state store unavailable: {} does not exist (run `cairn init` to create it)", path.display())]
    NotFound { path: PathBuf },

    #[error("state store unavailable: failed to read {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state document {} is malformed", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Someone else saved since this copy was loaded.
    #[error("write conflict: loaded revision {expected} but the store is at revision {found}")]
    WriteConflict { expected: u64, found: u64 },

    #[error("state document {} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to lock {}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state document")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::WriteConflict { .. })
    }
}
