//! Keyed store abstraction used by every stateful component.
//!
//! The contract is deliberately small: get, upsert, remove and list by
//! predicate, atomic per key only. Secondary indexes are derived state and
//! can always be rebuilt from the primary store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::Result;

/// Predicate passed to [`KeyedStore::list`].
pub type Predicate<'a, V> = &'a (dyn Fn(&V) -> bool + Send + Sync);

/// Minimal keyed persistence capability.
#[async_trait]
pub trait KeyedStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Fetch a value by key.
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Insert or replace a value.
    async fn put(&self, key: &str, value: V) -> Result<()>;

    /// Remove a value, returning it if present.
    async fn remove(&self, key: &str) -> Result<Option<V>>;

    /// List every value satisfying the predicate. Order is unspecified.
    async fn list(&self, predicate: Predicate<'_, V>) -> Result<Vec<V>>;

    /// Every stored key. Order is unspecified.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Number of stored values.
    async fn len(&self) -> Result<usize>;

    /// Whether the store holds no values.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// List every stored value.
    async fn all(&self) -> Result<Vec<V>> {
        self.list(&|_| true).await
    }
}

/// In-memory [`KeyedStore`] backed by a sharded concurrent map.
pub struct MemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> KeyedStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: V) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<V>> {
        Ok(self.entries.remove(key).map(|(_, value)| value))
    }

    async fn list(&self, predicate: Predicate<'_, V>) -> Result<Vec<V>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

/// Secondary index: index key to an ordered list of primary keys.
#[derive(Default)]
pub struct SecondaryIndex {
    entries: DashMap<String, Vec<String>>,
}

impl SecondaryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a primary key under an index key. Duplicates are ignored.
    pub fn insert(&self, index_key: &str, primary_key: &str) {
        let mut keys = self.entries.entry(index_key.to_string()).or_default();
        if !keys.iter().any(|k| k == primary_key) {
            keys.push(primary_key.to_string());
        }
    }

    /// Remove a primary key from an index key.
    pub fn remove(&self, index_key: &str, primary_key: &str) {
        let now_empty = match self.entries.get_mut(index_key) {
            Some(mut keys) => {
                keys.retain(|k| k != primary_key);
                keys.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.entries.remove(index_key);
        }
    }

    /// Primary keys under an index key, in insertion order.
    pub fn get(&self, index_key: &str) -> Vec<String> {
        self.entries
            .get(index_key)
            .map(|keys| keys.value().clone())
            .unwrap_or_default()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Replace the index contents with the given (index key, primary key) pairs.
    pub fn rebuild<I, K, P>(&self, pairs: I)
    where
        I: IntoIterator<Item = (K, P)>,
        K: AsRef<str>,
        P: AsRef<str>,
    {
        self.clear();
        for (index_key, primary_key) in pairs {
            self.insert(index_key.as_ref(), primary_key.as_ref());
        }
    }
}

/// Per-key async mutex table.
///
/// Serializes read-modify-write sequences on one key while leaving other
/// keys uncontended. An entry lives only while some task holds or waits
/// for its lock.
#[derive(Default)]
pub struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a key, waiting if another task holds it.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        KeyGuard {
            table: self,
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock on one key of a [`KeyLocks`] table.
///
/// Dropping it unlocks the key and removes the table entry when no other
/// task holds a handle to the same mutex.
pub struct KeyGuard<'a> {
    table: &'a KeyLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release our handle first so only the table's reference remains
        self.guard.take();
        // Handles are cloned under the shard lock, which remove_if also takes
        self.table
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
