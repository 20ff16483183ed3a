//! In-memory channel store
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ChannelRecord, ChannelStore, Snapshot};
use crate::channel::SharedState;
use crate::errors::Result;
use crate::types::{ChannelId, KeyPath};

/// Channel store held entirely in memory
///
/// All operations serialize on one mutex, which makes every mutation
/// atomic. Contents, including the key path counter, are lost when the
/// store is dropped; use [`super::FileStore`] when key paths must survive
/// restarts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Snapshot>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChannelStore for MemoryStore {
    fn get(&self, id: &ChannelId) -> Result<Option<ChannelRecord>> { Ok(self.lock().get(id)) }

    fn list(&self) -> Result<Vec<ChannelRecord>> { Ok(self.lock().list()) }

    fn list_payments(&self, id: &ChannelId) -> Result<Vec<Vec<u8>>> {
        Ok(self.lock().list_payments(id))
    }

    fn reserve_key_path(&self) -> Result<KeyPath> { self.lock().reserve_key_path() }

    fn create(&self, record: ChannelRecord) -> Result<()> { self.lock().create(record) }

    fn update(
        &self,
        id: &ChannelId,
        prior: &SharedState,
        next: &SharedState,
        payment: Option<&[u8]>,
    ) -> Result<()> {
        self.lock().update(id, prior, next, payment)
    }
}
