//! Persistent store abstraction
//!
//! This module provides a trait-based abstraction for channel storage,
//! allowing different backends to be used interchangeably. Every mutation
//! is a single atomic call:
//!
//! - [`ChannelStore::reserve_key_path`] hands out each index at most once
//! - [`ChannelStore::create`] inserts a record only if its ID is free
//! - [`ChannelStore::update`] compare-and-swaps a record's state and
//!   optionally appends one payment in the same step
//!
//! A rejected compare-and-swap surfaces as [`Error::Conflict`]; the store
//! never retries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channel::SharedState;
use crate::errors::{Error, Result, StorageError};
use crate::types::{ChannelId, KeyPath, KEY_PATH_LIMIT};

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// One persisted channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Channel ID
    pub id: ChannelId,
    /// Index of the channel's key in the key tree
    pub key_path: KeyPath,
    /// Current protocol state
    pub shared_state: SharedState,
}

/// Storage backend for channel records and payment logs
pub trait ChannelStore: Send + Sync {
    /// Gets a record by ID
    ///
    /// # Returns
    /// `Ok(Some(record))` if found, `Ok(None)` if not found, or error
    fn get(&self, id: &ChannelId) -> Result<Option<ChannelRecord>>;

    /// Lists every record ever created, ordered by ID
    fn list(&self) -> Result<Vec<ChannelRecord>>;

    /// Lists a channel's raw payment envelopes in acceptance order
    ///
    /// Returns an empty list for channels without payments.
    fn list_payments(&self, id: &ChannelId) -> Result<Vec<Vec<u8>>>;

    /// Atomically reserves the next unused key path
    ///
    /// Indices are monotonic and never reissued, even after the channel
    /// using them closes.
    fn reserve_key_path(&self) -> Result<KeyPath>;

    /// Inserts a new record
    ///
    /// # Errors
    /// `StorageError::IdCollision` if a record with the same ID exists.
    fn create(&self, record: ChannelRecord) -> Result<()>;

    /// Replaces a record's state if it still equals `prior`
    ///
    /// When `payment` is given it is appended to the channel's payment log
    /// in the same atomic step.
    ///
    /// # Errors
    /// * `Error::NotFound` - no record with this ID
    /// * `Error::Conflict` - the persisted state differs from `prior`
    fn update(
        &self,
        id: &ChannelId,
        prior: &SharedState,
        next: &SharedState,
        payment: Option<&[u8]>,
    ) -> Result<()>;
}

/// Complete store contents
///
/// Backends wrap this in their own synchronization and durability layer and
/// delegate the mutation rules to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    next_key_path: KeyPath,
    records: BTreeMap<ChannelId, ChannelRecord>,
    payments: BTreeMap<ChannelId, Vec<Vec<u8>>>,
}

impl Snapshot {
    pub(crate) fn get(&self, id: &ChannelId) -> Option<ChannelRecord> {
        self.records.get(id).cloned()
    }

    pub(crate) fn list(&self) -> Vec<ChannelRecord> { self.records.values().cloned().collect() }

    pub(crate) fn list_payments(&self, id: &ChannelId) -> Vec<Vec<u8>> {
        self.payments.get(id).cloned().unwrap_or_default()
    }

    pub(crate) fn reserve_key_path(&mut self) -> Result<KeyPath> {
        let path = self.next_key_path;
        if path >= KEY_PATH_LIMIT {
            return Err(StorageError::KeyPathsExhausted.into());
        }
        self.next_key_path = path + 1;
        Ok(path)
    }

    pub(crate) fn create(&mut self, record: ChannelRecord) -> Result<()> {
        if self.records.contains_key(&record.id) {
            return Err(StorageError::IdCollision(record.id).into());
        }
        self.records.insert(record.id, record);
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        id: &ChannelId,
        prior: &SharedState,
        next: &SharedState,
        payment: Option<&[u8]>,
    ) -> Result<()> {
        let record = self.records.get_mut(id).ok_or(Error::NotFound(*id))?;
        if &record.shared_state != prior {
            return Err(Error::Conflict(*id));
        }
        record.shared_state = next.clone();
        if let Some(payment) = payment {
            self.payments.entry(*id).or_default().push(payment.to_vec());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::created_state;

    fn record(byte: u8, key_path: KeyPath) -> ChannelRecord {
        let id = ChannelId::from_bytes([byte; 32]);
        ChannelRecord { id, key_path, shared_state: created_state() }
    }

    #[test]
    fn test_reserve_key_path() {
        let mut snapshot = Snapshot::default();
        assert_eq!(snapshot.reserve_key_path().unwrap(), 0);
        assert_eq!(snapshot.reserve_key_path().unwrap(), 1);

        snapshot.next_key_path = KEY_PATH_LIMIT - 1;
        assert_eq!(snapshot.reserve_key_path().unwrap(), KEY_PATH_LIMIT - 1);
        assert_eq!(
            snapshot.reserve_key_path(),
            Err(Error::Storage(StorageError::KeyPathsExhausted))
        );
    }

    #[test]
    fn test_create_rejects_collision() {
        let mut snapshot = Snapshot::default();
        snapshot.create(record(1, 0)).unwrap();
        let err = snapshot.create(record(1, 1)).unwrap_err();
        assert_eq!(err, Error::Storage(StorageError::IdCollision(ChannelId::from_bytes([1; 32]))));
        // The first record is untouched
        assert_eq!(snapshot.get(&ChannelId::from_bytes([1; 32])).unwrap().key_path, 0);
    }

    #[test]
    fn test_update_compare_and_swap() {
        let mut snapshot = Snapshot::default();
        let first = record(1, 0);
        let id = first.id;
        snapshot.create(first.clone()).unwrap();

        let s = first.shared_state;
        let mut s2 = s.clone();
        s2.balance = 10;
        let mut s3 = s.clone();
        s3.balance = 20;

        snapshot.update(&id, &s, &s2, Some(b"p1")).unwrap();
        assert_eq!(snapshot.update(&id, &s, &s3, Some(b"p2")), Err(Error::Conflict(id)));

        assert_eq!(snapshot.get(&id).unwrap().shared_state, s2);
        assert_eq!(snapshot.list_payments(&id), vec![b"p1".to_vec()]);
    }

    #[test]
    fn test_update_unknown_channel() {
        let mut snapshot = Snapshot::default();
        let s = created_state();
        let id = ChannelId::from_bytes([5; 32]);
        assert_eq!(snapshot.update(&id, &s, &s, None), Err(Error::NotFound(id)));
    }

    #[test]
    fn test_list_is_ordered_by_id() {
        let mut snapshot = Snapshot::default();
        snapshot.create(record(3, 0)).unwrap();
        snapshot.create(record(1, 1)).unwrap();
        snapshot.create(record(2, 2)).unwrap();

        let ids: Vec<u8> = snapshot.list().iter().map(|r| r.id.as_bytes()[0]).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(snapshot.list_payments(&ChannelId::from_bytes([1; 32])).is_empty());
    }
}
