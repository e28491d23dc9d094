//! Shared collection abstractions used throughout lb-core.
//!
//! The symbol table is read from every binding thread, so maps are backed by
//! `dashmap::DashMap`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;

pub struct ConcurrentMap<K, V> {
    inner: DashMap<K, V>,
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Inserts and returns the previous value, if any.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn get_cloned(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    /// Replaces the value under `key` with `func(previous)` while the entry
    /// is locked, and returns the new value.
    pub fn upsert(&self, key: K, func: impl FnOnce(Option<&V>) -> V) -> V
    where
        V: Clone,
    {
        match self.inner.entry(key) {
            Entry::Occupied(mut entry) => {
                let next = func(Some(entry.get()));
                entry.insert(next.clone());
                next
            }
            Entry::Vacant(entry) => {
                let next = func(None);
                entry.insert(next.clone());
                next
            }
        }
    }
}
