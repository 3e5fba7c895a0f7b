//! In-process [`KeyValueStore`] backed by `DashMap`.
//!
//! Expiry is lazy: reads treat an expired entry as absent and remove it.
//! [`MemoryStore::purge_expired`] sweeps the whole map and is meant to be
//! driven from a periodic task.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{KeyValueStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum StoredValue {
    Bytes(Vec<u8>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: StoredValue,
    expires_at: Instant,
}

impl StoredEntry {
    fn new(value: StoredValue, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Single-instance store. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries, including ones that expired but were not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_entry(&self, key: &str) -> Option<StoredEntry> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove_if(key, |_, e| e.is_expired());
            return None;
        }
        Some(entry.clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.live_entry(key) {
            None => Ok(None),
            Some(StoredEntry {
                value: StoredValue::Bytes(bytes),
                ..
            }) => Ok(Some(bytes)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            StoredEntry::new(StoredValue::Bytes(value), ttl),
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<bool> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(StoredEntry::new(StoredValue::Bytes(value), ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredEntry::new(StoredValue::Bytes(value), ttl));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.live_entry(key).is_some())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        new: Vec<u8>,
        ttl: Duration,
    ) -> StoreResult<bool> {
        // The RefMut holds the shard write lock for the whole check-and-set.
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if entry.is_expired() {
            return Ok(false);
        }
        match &entry.value {
            StoredValue::Bytes(current) if current.as_slice() == expected => {
                *entry = StoredEntry::new(StoredValue::Bytes(new), ttl);
                Ok(true)
            }
            StoredValue::Bytes(_) => Ok(false),
            StoredValue::Set(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> StoreResult<()> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired() {
                    entry.value = StoredValue::Set(HashSet::new());
                }
                match &mut entry.value {
                    StoredValue::Set(members) => {
                        members.insert(member.to_string());
                    }
                    StoredValue::Bytes(_) => return Err(StoreError::WrongType(key.to_string())),
                }
                entry.expires_at = Instant::now() + ttl;
            }
            Entry::Vacant(vacant) => {
                let members = HashSet::from([member.to_string()]);
                vacant.insert(StoredEntry::new(StoredValue::Set(members), ttl));
            }
        }
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            match &mut entry.value {
                StoredValue::Set(members) => {
                    members.remove(member);
                }
                StoredValue::Bytes(_) => return Err(StoreError::WrongType(key.to_string())),
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        match self.live_entry(key) {
            None => Ok(Vec::new()),
            Some(StoredEntry {
                value: StoredValue::Set(members),
                ..
            }) => Ok(members.into_iter().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }
}
