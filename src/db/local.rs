//! File-backed database adapter.
//!
//! A database is a single file holding a `SealedSnapshot` under the session key.
//! The whole snapshot is kept in memory while the handle is open and rewritten on
//! every mutating operation and on close.

use super::cipher::{seal, unseal};
use super::{Backend, DatabaseHandle, StoreError, StoreResult};
use crate::keys::KeyMaterial;
use crate::models::{SealedSnapshot, Snapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Opens `LocalHandle`s on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl Backend for LocalBackend {
    type Handle = LocalHandle;

    fn open(&self, key: &KeyMaterial, path: &Path) -> StoreResult<LocalHandle> {
        let snapshot = if path.exists() {
            debug!("Opening existing database at {}", path.display());
            let sealed: SealedSnapshot = read_json(path)?;
            let plaintext = unseal(key, &sealed, path)
                .map_err(|_| StoreError::InvalidKey(path.to_path_buf()))?;
            serde_json::from_slice(&plaintext).map_err(|e| StoreError::format(path, e))?
        } else {
            info!("Creating new database at {}", path.display());
            Snapshot::default()
        };

        let handle = LocalHandle {
            path: path.to_path_buf(),
            key: key.clone(),
            snapshot,
            closed: false,
        };
        handle.persist()?;
        Ok(handle)
    }
}

/// An open local database.
pub struct LocalHandle {
    path: PathBuf,
    key: KeyMaterial,
    snapshot: Snapshot,
    closed: bool,
}

impl LocalHandle {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn authorize(&self, key: &KeyMaterial) -> StoreResult<()> {
        self.ensure_open()?;
        if *key != self.key {
            return Err(StoreError::InvalidKey(self.path.clone()));
        }
        Ok(())
    }

    fn persist(&self) -> StoreResult<()> {
        let plaintext =
            serde_json::to_vec(&self.snapshot).map_err(|e| StoreError::format(&self.path, e))?;
        write_json(&self.path, &seal(&self.key, &plaintext)?)
    }
}

impl DatabaseHandle for LocalHandle {
    fn export(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()> {
        self.authorize(key)?;
        write_json(path, &self.snapshot)?;
        debug!(
            "Exported {} entries to {}",
            self.snapshot.entries.len(),
            path.display()
        );
        Ok(())
    }

    fn import(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()> {
        self.authorize(key)?;
        let incoming: Snapshot = read_json(path)?;
        let count = self.snapshot.merge(incoming);
        self.persist()?;
        debug!("Imported {} entries from {}", count, path.display());
        Ok(())
    }

    fn export_encrypted(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()> {
        self.ensure_open()?;
        let plaintext =
            serde_json::to_vec(&self.snapshot).map_err(|e| StoreError::format(path, e))?;
        write_json(path, &seal(key, &plaintext)?)
    }

    fn import_encrypted(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()> {
        self.ensure_open()?;
        let sealed: SealedSnapshot = read_json(path)?;
        let plaintext = unseal(key, &sealed, path)?;
        let incoming: Snapshot =
            serde_json::from_slice(&plaintext).map_err(|e| StoreError::format(path, e))?;
        let count = self.snapshot.merge(incoming);
        self.persist()?;
        debug!("Imported {} encrypted entries from {}", count, path.display());
        Ok(())
    }

    fn change_key(&mut self, old: &KeyMaterial, new: &KeyMaterial) -> StoreResult<()> {
        self.authorize(old)?;
        let previous = std::mem::replace(&mut self.key, new.clone());
        if let Err(e) = self.persist() {
            self.key = previous;
            return Err(e);
        }
        info!("Re-keyed database at {}", self.path.display());
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        self.persist()?;
        self.closed = true;
        debug!("Closed database at {}", self.path.display());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::format(path, e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::format(path, e))?;
    fs::write(path, bytes).map_err(|e| StoreError::io(path, e))
}
