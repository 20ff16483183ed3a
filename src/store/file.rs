//! File-backed channel store
//!
//! The whole store is kept as one JSON document. Each mutation is applied to
//! a copy of the in-memory snapshot, written to a temporary file in the same
//! directory, and renamed over the previous document before the copy becomes
//! the live snapshot. A crash at any point leaves either the old or the new
//! document on disk.
//!
//! # Invariants
//!
//! - The key path counter is persisted with every reservation, so a restarted
//!   process never reissues an index
//! - The live snapshot never runs ahead of the document on disk

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;
use tracing::debug;

use super::{ChannelRecord, ChannelStore, Snapshot};
use crate::channel::SharedState;
use crate::errors::{Result, StorageError};
use crate::types::{ChannelId, KeyPath};

/// Channel store persisted to a single JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<Snapshot>,
}

impl FileStore {
    /// Opens the store at `path`, creating an empty one if the file is absent
    ///
    /// # Errors
    ///
    /// * `StorageError::Io` - the file exists but cannot be read
    /// * `StorageError::Encoding` - the file is not a valid store document
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| StorageError::Io(e.to_string()))?;
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Encoding(e.to_string()))?
        } else {
            Snapshot::default()
        };
        debug!(path = %path.display(), "opened channel store");
        Ok(Self { path, inner: Mutex::new(snapshot) })
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` to a copy of the snapshot and commits it if `f` succeeds
    fn mutate<T>(&self, f: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut live = self.lock();
        let mut next = live.clone();
        let out = f(&mut next)?;
        self.write(&next)?;
        *live = next;
        Ok(out)
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let bytes =
            serde_json::to_vec(snapshot).map_err(|e| StorageError::Encoding(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StorageError::Io(e.to_string()))?;
        tmp.write_all(&bytes).map_err(|e| StorageError::Io(e.to_string()))?;
        tmp.as_file().sync_all().map_err(|e| StorageError::Io(e.to_string()))?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error.to_string()))?;
        Ok(())
    }
}

impl ChannelStore for FileStore {
    fn get(&self, id: &ChannelId) -> Result<Option<ChannelRecord>> { Ok(self.lock().get(id)) }

    fn list(&self) -> Result<Vec<ChannelRecord>> { Ok(self.lock().list()) }

    fn list_payments(&self, id: &ChannelId) -> Result<Vec<Vec<u8>>> {
        Ok(self.lock().list_payments(id))
    }

    fn reserve_key_path(&self) -> Result<KeyPath> { self.mutate(Snapshot::reserve_key_path) }

    fn create(&self, record: ChannelRecord) -> Result<()> {
        self.mutate(|snapshot| snapshot.create(record))
    }

    fn update(
        &self,
        id: &ChannelId,
        prior: &SharedState,
        next: &SharedState,
        payment: Option<&[u8]>,
    ) -> Result<()> {
        self.mutate(|snapshot| snapshot.update(id, prior, next, payment))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::errors::Error;
    use crate::test_utils::created_state;

    #[test]
    fn test_key_paths_survive_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");

        {
            let store = FileStore::open(&path).unwrap();
            assert_eq!(store.reserve_key_path().unwrap(), 0);
            assert_eq!(store.reserve_key_path().unwrap(), 1);
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.reserve_key_path().unwrap(), 2);
    }

    #[test]
    fn test_records_and_payments_survive_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        let id = ChannelId::from_bytes([4; 32]);
        let s = created_state();
        let mut s2 = s.clone();
        s2.balance = 77;

        {
            let store = FileStore::open(&path).unwrap();
            store.create(ChannelRecord { id, key_path: 0, shared_state: s.clone() }).unwrap();
            store.update(&id, &s, &s2, Some(b"{\"amount\":77}")).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.shared_state, s2);
        assert_eq!(store.list_payments(&id).unwrap(), vec![b"{\"amount\":77}".to_vec()]);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_mutation_is_not_committed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        let id = ChannelId::from_bytes([4; 32]);
        let s = created_state();
        let mut stale = s.clone();
        stale.balance = 1;

        let store = FileStore::open(&path).unwrap();
        store.create(ChannelRecord { id, key_path: 0, shared_state: s.clone() }).unwrap();
        assert_eq!(store.update(&id, &stale, &s, Some(b"x")), Err(Error::Conflict(id)));

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.list_payments(&id).unwrap().is_empty());
        assert_eq!(reopened.get(&id).unwrap().unwrap().shared_state, s);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(Error::Storage(StorageError::Encoding(_)))));
    }
}
