//! SpanHashMap: unique-key map over [`RawTable`].

use crate::error::TryReserveError;
use crate::mixer::{Mixer, SeededState};
use crate::node::MapNode;
use crate::raw_table::{self, RawTable};
use crate::seed::{HashSeed, SeedAuthority};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

pub struct SpanHashMap<K, V, S = SeededState> {
    table: RawTable<MapNode<K, V>, S>,
}

impl<K, V> SpanHashMap<K, V> {
    /// Empty map seeded by the process-wide authority.
    pub fn new() -> Self {
        Self::with_hasher(SeededState::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, SeededState::default())
    }

    /// Map with a fixed seed; `HashSeed::ZERO` gives a reproducible layout.
    pub fn with_seed(seed: HashSeed) -> Self {
        Self::with_hasher(SeededState::new(seed, Mixer::detect()))
    }

    /// Map seeded by a specific authority instead of the global one.
    pub fn with_authority(authority: &SeedAuthority) -> Self {
        Self::with_hasher(SeededState::from_authority(authority))
    }

    pub fn seed(&self) -> HashSeed {
        self.table.seed()
    }
}

impl<K, V> Default for SpanHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> SpanHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: RawTable::with_hasher(hasher),
        }
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            table: RawTable::with_capacity_and_hasher(capacity, hasher),
        }
    }

    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Entries the map holds before it has to grow.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn load_factor(&self) -> f64 {
        self.table.load_factor()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Entries in bucket order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Entries with mutable values; order is unspecified.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, v)| v)
    }

    /// Moves every entry out, leaving the map empty.
    pub fn drain(&mut self) -> IntoIter<K, V> {
        IntoIter {
            inner: self.table.drain(),
        }
    }

    /// The underlying table, for bucket-level inspection.
    pub fn raw_table(&self) -> &RawTable<MapNode<K, V>, S> {
        &self.table
    }
}

impl<K, V, S> SpanHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Inserts or overwrites; returns the previous value for `key`.
    ///
    /// An overwrite keeps the stored key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let r = self.table.find_or_insert(&key);
        if r.initialized {
            return Some(core::mem::replace(&mut self.table.node_mut(r.bucket).value, value));
        }
        self.table.insert_node(r.bucket, MapNode::new(key, value));
        None
    }

    /// Value for `key`, inserting `make()` first if the key is absent.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        let r = self.table.find_or_insert(&key);
        if r.initialized {
            return &mut self.table.node_mut(r.bucket).value;
        }
        &mut self.table.insert_node(r.bucket, MapNode::new(key, make())).value
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find_node(key).map(|n| &n.value)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find_node(key).map(|n| (&n.key, &n.value))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find_node_mut(key).map(|n| &mut n.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(key).map(|n| n.value)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(key).map(|n| (n.key, n.value))
    }

    /// Keeps the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        self.table.retain(|n| keep(&n.key, &mut n.value));
    }

    /// Makes room for `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        match self.len().checked_add(additional) {
            Some(total) => self.table.reserve(total),
            None => crate::error::capacity_overflow(),
        }
    }

    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let total = self
            .len()
            .checked_add(additional)
            .ok_or(TryReserveError::CapacityOverflow)?;
        self.table.try_reserve(total)
    }

    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for SpanHashMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for SpanHashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for SpanHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Eq + Hash, V: Eq, S: BuildHasher> Eq for SpanHashMap<K, V, S> {}

impl<K, V, S> Extend<(K, V)> for SpanHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for SpanHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, S> IntoIterator for SpanHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a SpanHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut SpanHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

pub struct Iter<'a, K, V> {
    inner: raw_table::Iter<'a, MapNode<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|n| (&n.key, &n.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

pub struct IterMut<'a, K, V> {
    inner: raw_table::IterMut<'a, MapNode<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|n| (&n.key, &mut n.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

pub struct IntoIter<K, V> {
    inner: raw_table::IntoIter<MapNode<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next().map(|n| (n.key, n.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
