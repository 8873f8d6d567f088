//! SpanMultiMap: one table slot per key, the values chained behind it.
//!
//! Lookup cost is that of the unique-key map; per-key value search is a
//! linear scan of the chain. The map tracks the total number of values
//! separately from the number of keys.

use crate::chain;
use crate::mixer::{Mixer, SeededState};
use crate::node::MultiNode;
use crate::raw_table::RawTable;
use crate::seed::HashSeed;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

pub struct SpanMultiMap<K, V, S = SeededState> {
    table: RawTable<MultiNode<K, V>, S>,
    total: usize,
}

impl<K, V> SpanMultiMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(SeededState::default())
    }

    pub fn with_seed(seed: HashSeed) -> Self {
        Self::with_hasher(SeededState::new(seed, Mixer::detect()))
    }
}

impl<K, V> Default for SpanMultiMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> SpanMultiMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: RawTable::with_hasher(hasher),
            total: 0,
        }
    }

    /// Total number of values across all keys.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.table.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.total = 0;
    }

    /// Distinct keys in bucket order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.table.iter().map(|n| &n.key)
    }

    /// Every key/value pair; one key's values come most recent first.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.table
            .iter()
            .flat_map(|n| n.values.iter().map(move |v| (&n.key, v)))
    }
}

impl<K: Eq + Hash, V, S: BuildHasher> SpanMultiMap<K, V, S> {
    /// Adds `value` in front of any values already stored for `key`.
    pub fn insert(&mut self, key: K, value: V) {
        let r = self.table.find_or_insert(&key);
        if r.initialized {
            self.table.node_mut(r.bucket).insert_multi(value);
        } else {
            self.table.insert_node(r.bucket, MultiNode::new(key, value));
        }
        self.total += 1;
    }

    /// Overwrites the most recent value for `key`, or inserts it.
    pub fn replace(&mut self, key: K, value: V) -> Option<V> {
        let r = self.table.find_or_insert(&key);
        if r.initialized {
            if let Some(slot) = self.table.node_mut(r.bucket).values.first_mut() {
                return Some(core::mem::replace(slot, value));
            }
        }
        self.table.insert_node(r.bucket, MultiNode::new(key, value));
        self.total += 1;
        None
    }

    /// Values for `key`, most recent first; empty if the key is absent.
    pub fn values<Q>(&self, key: &Q) -> chain::Iter<'_, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.table.find_node(key) {
            Some(n) => n.values.iter(),
            None => chain::Iter::empty(),
        }
    }

    /// Most recently inserted value for `key`.
    pub fn value<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find_node(key).and_then(|n| n.values.first())
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(key)
    }

    pub fn contains_value<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        self.table
            .find_node(key)
            .is_some_and(|n| n.values.contains(value))
    }

    /// Values stored for `key`.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find_node(key).map_or(0, |n| n.values.len())
    }

    /// Removes `key` with all its values; returns how many values went.
    pub fn remove<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let freed = self.table.remove(key).map_or(0, MultiNode::free_chain);
        self.total -= freed;
        freed
    }

    /// Removes every `value` stored under `key`, and the key itself once
    /// its chain is empty.
    pub fn remove_value<Q>(&mut self, key: &Q, value: &V) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        let Some(b) = self.table.find(key) else {
            return 0;
        };
        let node = self.table.node_mut(b);
        let removed = node.values.remove_all(value);
        if node.values.is_empty() {
            drop(self.table.erase(b));
        }
        self.total -= removed;
        removed
    }

    /// Takes the most recent value for `key`.
    pub fn take<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let b = self.table.find(key)?;
        let node = self.table.node_mut(b);
        let value = node.values.pop_front();
        if node.values.is_empty() {
            drop(self.table.erase(b));
        }
        if value.is_some() {
            self.total -= 1;
        }
        value
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for SpanMultiMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            total: self.total,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for SpanMultiMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.table.iter().map(|n| (&n.key, &n.values)))
            .finish()
    }
}

/// Equal when both hold the same keys, each with an equal value chain.
/// Bucket layout and seeds do not take part.
impl<K, V, S> PartialEq for SpanMultiMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.key_count() == other.key_count()
            && self.table.iter().all(|n| {
                other
                    .table
                    .find_node(&n.key)
                    .is_some_and(|o| o.values == n.values)
            })
    }
}

impl<K: Eq + Hash, V: Eq, S: BuildHasher> Eq for SpanMultiMap<K, V, S> {}

impl<K: Eq + Hash, V, S: BuildHasher> Extend<(K, V)> for SpanMultiMap<K, V, S> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Eq + Hash, V, S: BuildHasher + Default> FromIterator<(K, V)> for SpanMultiMap<K, V, S> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}
