//! Node types stored in table slots.

use crate::chain::ValueChain;
use core::hash::Hash;

/// Anything a [`RawTable`](crate::raw_table::RawTable) can store: a value
/// that exposes the key it is addressed by.
///
/// `Hash` and `Eq` of the key must agree; the table recomputes a node's
/// bucket from its key whenever it rehashes or repairs a probe chain.
pub trait Node {
    type Key: Hash + Eq;
    fn key(&self) -> &Self::Key;
}

/// Key/value node. A set stores `MapNode<K, ()>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MapNode<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> MapNode<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}

impl<K: Hash + Eq, V> Node for MapNode<K, V> {
    type Key = K;
    #[inline]
    fn key(&self) -> &K {
        &self.key
    }
}

/// Node of a multi-valued table: one key, many values.
#[derive(Clone, Debug)]
pub struct MultiNode<K, V> {
    pub key: K,
    pub values: ValueChain<V>,
}

impl<K, V> MultiNode<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            values: ValueChain::new(value),
        }
    }

    /// Prepends another value for this key.
    pub fn insert_multi(&mut self, value: V) {
        self.values.push_front(value);
    }

    /// Drops every value; returns how many there were.
    pub fn free_chain(self) -> usize {
        self.values.free()
    }
}

impl<K: Hash + Eq, V> Node for MultiNode<K, V> {
    type Key = K;
    #[inline]
    fn key(&self) -> &K {
        &self.key
    }
}
