//! SpanHashSet: a [`RawTable`] of key-only nodes.

use crate::mixer::{Mixer, SeededState};
use crate::node::MapNode;
use crate::raw_table::{self, RawTable};
use crate::seed::HashSeed;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

pub struct SpanHashSet<K, S = SeededState> {
    table: RawTable<MapNode<K, ()>, S>,
}

impl<K> SpanHashSet<K> {
    pub fn new() -> Self {
        Self::with_hasher(SeededState::default())
    }

    pub fn with_seed(seed: HashSeed) -> Self {
        Self::with_hasher(SeededState::new(seed, Mixer::detect()))
    }
}

impl<K> Default for SpanHashSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> SpanHashSet<K, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: RawTable::with_hasher(hasher),
        }
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

    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Keys in bucket order.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            inner: self.table.iter(),
        }
    }
}

impl<K: Eq + Hash, S: BuildHasher> SpanHashSet<K, S> {
    /// Returns false if the key was already present; the stored key is kept.
    pub fn insert(&mut self, key: K) -> bool {
        let r = self.table.find_or_insert(&key);
        if r.initialized {
            return false;
        }
        self.table.insert_node(r.bucket, MapNode::new(key, ()));
        true
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(key).is_some()
    }

    pub fn take<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(key).map(|n| n.key)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.table.retain(|n| keep(&n.key));
    }
}

impl<K: Clone, S: Clone> Clone for SpanHashSet<K, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K: fmt::Debug, S> fmt::Debug for SpanHashSet<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Eq + Hash, S: BuildHasher> Extend<K> for SpanHashSet<K, S> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for k in iter {
            self.insert(k);
        }
    }
}

impl<K: Eq + Hash, S: BuildHasher + Default> FromIterator<K> for SpanHashSet<K, S> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::with_hasher(S::default());
        set.extend(iter);
        set
    }
}

impl<'a, K, S> IntoIterator for &'a SpanHashSet<K, S> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;
    fn into_iter(self) -> Iter<'a, K> {
        self.iter()
    }
}

pub struct Iter<'a, K> {
    inner: raw_table::Iter<'a, MapNode<K, ()>>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;
    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|n| &n.key)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> ExactSizeIterator for Iter<'_, K> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_novelty() {
        let mut s = SpanHashSet::with_seed(HashSeed::new(1, 2));
        assert!(s.insert("x".to_string()));
        assert!(!s.insert("x".to_string()));
        assert!(s.contains("x"));
        assert_eq!(s.len(), 1);
        assert!(s.remove("x"));
        assert!(!s.remove("x"));
        assert!(s.is_empty());
    }

    #[test]
    fn collect_and_retain() {
        let mut s: SpanHashSet<u64> = (0..500).chain(0..500).collect();
        assert_eq!(s.len(), 500);
        assert_eq!(s.bucket_count(), 1024);
        s.retain(|k| k % 2 == 1);
        assert_eq!(s.iter().count(), 250);
        assert_eq!(s.take(&3), Some(3));
        assert!(!s.contains(&3));
    }
}
