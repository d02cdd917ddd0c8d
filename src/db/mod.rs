//! Provides the database collaborator seam.
//!
//! The session only talks to a database through `Backend` (open) and
//! `DatabaseHandle` (everything an open database can do). `local` is the
//! file-backed adapter used by the binary; `cipher` is its AES-256-GCM sealing.

mod cipher;
mod local;

pub use local::*;

use crate::keys::KeyMaterial;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by a database backend. Displayed to the user verbatim.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("invalid key for database {0}")]
    InvalidKey(PathBuf),

    #[error("database handle is closed")]
    Closed,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("malformed data in {path}: {source}")]
    Format {
        path: PathBuf,
        source: Arc<serde_json::Error>,
    },

    #[error("failed to decrypt {0}: wrong key or corrupted data")]
    Decrypt(PathBuf),

    #[error("encryption failed")]
    Encrypt,
}

impl StoreError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source: Arc::new(err),
        }
    }

    pub(crate) fn format(path: &Path, err: serde_json::Error) -> Self {
        StoreError::Format {
            path: path.to_path_buf(),
            source: Arc::new(err),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Opens database handles.
pub trait Backend: Send {
    type Handle: DatabaseHandle;

    /// Opens the database at `path` with `key`, creating it if it does not exist.
    fn open(&self, key: &KeyMaterial, path: &Path) -> StoreResult<Self::Handle>;
}

/// An open database. Exclusively owned by one session until `close`.
pub trait DatabaseHandle: Send {
    /// Writes the contents as plaintext JSON to `path`.
    fn export(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()>;

    /// Merges plaintext JSON from `path` into the database.
    fn import(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()>;

    /// Writes the contents sealed under `key` to `path`.
    fn export_encrypted(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()>;

    /// Merges contents sealed under `key` at `path` into the database.
    fn import_encrypted(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()>;

    /// Re-keys the database from `old` to `new`.
    fn change_key(&mut self, old: &KeyMaterial, new: &KeyMaterial) -> StoreResult<()>;

    fn close(&mut self) -> StoreResult<()>;
}
