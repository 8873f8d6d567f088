//! RawTable: open-addressing table over an array of spans.
//!
//! Buckets are addressed linearly; bucket `i` lives in span `i >> 7` at local
//! index `i & 127`. A key's ideal bucket is `hash & (num_buckets - 1)` and
//! lookups probe forward from there (wrapping) until they hit the key or an
//! empty bucket. The table grows when an insertion finds it half full, so
//! there is always an empty bucket to end a probe.
//!
//! Deletion uses back-shift repair instead of tombstones: after a bucket is
//! vacated, the following cluster is scanned and every entry that may move
//! into the hole without leaving its own probe sequence is shifted back.
//!
//! Cursors are plain [`Bucket`] indices. They are invalidated by anything
//! that rehashes (growth, `reserve`, `shrink_to_fit`, `clear`) but not by
//! `erase`, which never rehashes.

use crate::error::{capacity_overflow, TryReserveError};
use crate::mixer::{Mixer, SeededState};
use crate::node::Node;
use crate::reentrancy::RestructureGuard;
use crate::seed::HashSeed;
use crate::span::{self, Span, LOCAL_BUCKET_MASK, NENTRIES, SHIFT};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::mem;

/// Bucket count for a table meant to hold `capacity` elements.
///
/// Anything up to 64 elements gets one full span; larger requests get
/// `2 * capacity` rounded up to a power of two.
pub fn buckets_for_capacity(capacity: usize) -> Result<usize, TryReserveError> {
    if capacity <= NENTRIES / 2 {
        return Ok(NENTRIES);
    }
    capacity
        .checked_mul(2)
        .and_then(usize::checked_next_power_of_two)
        .ok_or(TryReserveError::CapacityOverflow)
}

fn max_bucket_count<N>() -> usize {
    let span_bytes = mem::size_of::<Span<N>>().max(1);
    (isize::MAX as usize / span_bytes).saturating_mul(NENTRIES)
}

/// True when an entry whose ideal bucket is `ideal`, found at `scan`, must
/// stay where it is rather than move back into `hole`.
///
/// That is the case when `ideal` lies in the cyclic range `(hole, scan]`:
/// the entry's probe starts after the hole, so moving it there would put it
/// before its own ideal bucket.
#[inline]
pub fn is_in_probe_order(hole: usize, ideal: usize, scan: usize, num_buckets: usize) -> bool {
    debug_assert!(num_buckets.is_power_of_two());
    let mask = num_buckets - 1;
    let to_ideal = ideal.wrapping_sub(hole) & mask;
    let to_scan = scan.wrapping_sub(hole) & mask;
    to_ideal != 0 && to_ideal <= to_scan
}

/// Cursor: a linear bucket index into one table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Bucket(usize);

impl Bucket {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
    #[inline]
    fn span(self) -> usize {
        self.0 >> SHIFT
    }
    #[inline]
    fn local(self) -> usize {
        self.0 & LOCAL_BUCKET_MASK
    }
}

/// Outcome of [`RawTable::find_or_insert`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InsertionResult {
    pub bucket: Bucket,
    /// The key was already present at `bucket`. Otherwise `bucket` is the
    /// empty bucket the caller must fill with [`RawTable::insert_node`].
    pub initialized: bool,
}

#[derive(Clone)]
struct SpanArray<N> {
    spans: Vec<Span<N>>,
    num_buckets: usize,
}

impl<N> SpanArray<N> {
    fn allocate(num_buckets: usize) -> Result<Self, TryReserveError> {
        debug_assert!(num_buckets.is_power_of_two() && num_buckets >= NENTRIES);
        if num_buckets > max_bucket_count::<N>() {
            return Err(TryReserveError::CapacityOverflow);
        }
        let n = num_buckets >> SHIFT;
        let mut spans = Vec::new();
        spans
            .try_reserve_exact(n)
            .map_err(|_| TryReserveError::AllocError {
                buckets: num_buckets,
            })?;
        spans.resize_with(n, Span::new);
        Ok(Self { spans, num_buckets })
    }

    #[inline]
    fn mask(&self) -> usize {
        self.num_buckets - 1
    }

    #[inline]
    fn has_node(&self, i: usize) -> bool {
        self.spans[i >> SHIFT].has_node(i & LOCAL_BUCKET_MASK)
    }

    #[inline]
    fn node(&self, i: usize) -> &N {
        self.spans[i >> SHIFT].at(i & LOCAL_BUCKET_MASK)
    }

    #[inline]
    fn node_mut(&mut self, i: usize) -> &mut N {
        self.spans[i >> SHIFT].at_mut(i & LOCAL_BUCKET_MASK)
    }

    /// First bucket from `hash`'s ideal bucket that is empty or holds a
    /// node accepted by `eq`.
    #[inline]
    fn probe(&self, hash: u64, mut eq: impl FnMut(&N) -> bool) -> usize {
        let mask = self.mask();
        let mut i = hash as usize & mask;
        loop {
            let span = &self.spans[i >> SHIFT];
            let local = i & LOCAL_BUCKET_MASK;
            if !span.has_node(local) || eq(span.at(local)) {
                return i;
            }
            i = (i + 1) & mask;
        }
    }

    fn insert_at(&mut self, i: usize, node: N) -> &mut N {
        self.spans[i >> SHIFT].insert(i & LOCAL_BUCKET_MASK, node)
    }

    fn next_occupied(&self, from: usize) -> Option<usize> {
        (from..self.num_buckets).find(|&i| self.has_node(i))
    }

    fn first_unused(&self) -> Option<usize> {
        (0..self.num_buckets).find(|&i| !self.has_node(i))
    }

    fn move_bucket(&mut self, from: usize, to: usize) {
        let (fs, fl) = (from >> SHIFT, from & LOCAL_BUCKET_MASK);
        let (ts, tl) = (to >> SHIFT, to & LOCAL_BUCKET_MASK);
        if fs == ts {
            self.spans[fs].move_local(fl, tl);
        } else if ts < fs {
            let (head, tail) = self.spans.split_at_mut(fs);
            head[ts].move_from_span(&mut tail[0], fl, tl);
        } else {
            let (head, tail) = self.spans.split_at_mut(ts);
            tail[0].move_from_span(&mut head[fs], fl, tl);
        }
    }
}

impl<N: Node> SpanArray<N> {
    /// Places a node whose key is known to be absent.
    fn place<S: BuildHasher>(&mut self, hasher: &S, node: N) {
        let hash = hasher.hash_one(node.key());
        let i = self.probe(hash, |_| false);
        self.insert_at(i, node);
    }

    /// Back-shift repair after bucket `hole` was emptied.
    fn close_gap<S: BuildHasher>(&mut self, hasher: &S, mut hole: usize) {
        let mask = self.mask();
        let mut next = hole;
        loop {
            next = (next + 1) & mask;
            if !self.has_node(next) {
                break;
            }
            let ideal = hasher.hash_one(self.node(next).key()) as usize & mask;
            if is_in_probe_order(hole, ideal, next, self.num_buckets) {
                continue;
            }
            self.move_bucket(next, hole);
            hole = next;
        }
    }
}

/// Open-addressing hash table storing nodes of type `N`.
///
/// `S` hashes keys; the default [`SeededState`] carries the table's seed
/// and mixer.
pub struct RawTable<N, S = SeededState> {
    buckets: SpanArray<N>,
    size: usize,
    hasher: S,
    guard: RestructureGuard,
}

impl<N> RawTable<N> {
    /// Empty table seeded by the process-wide authority.
    pub fn new() -> Self {
        Self::with_hasher(SeededState::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, SeededState::default())
    }

    /// Empty table with an explicit seed and the detected mixer.
    pub fn with_seed(seed: HashSeed) -> Self {
        Self::with_hasher(SeededState::new(seed, Mixer::detect()))
    }

    pub fn seed(&self) -> HashSeed {
        self.hasher.seed()
    }
}

impl<N> Default for RawTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, S> RawTable<N, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    /// Panics with "capacity overflow" if no table can hold `capacity`.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        match Self::try_with_capacity_and_hasher(capacity, hasher) {
            Ok(t) => t,
            Err(e) => fatal::<N>(e),
        }
    }

    pub fn try_with_capacity_and_hasher(capacity: usize, hasher: S) -> Result<Self, TryReserveError> {
        let buckets = SpanArray::allocate(buckets_for_capacity(capacity)?)?;
        Ok(Self {
            buckets,
            size: 0,
            hasher,
            guard: RestructureGuard::new(),
        })
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.num_buckets
    }

    /// Nodes the table holds before the next insertion grows it.
    pub fn capacity(&self) -> usize {
        self.buckets.num_buckets >> 1
    }

    pub fn load_factor(&self) -> f64 {
        self.size as f64 / self.buckets.num_buckets as f64
    }

    /// The next insertion of a new key rehashes first.
    #[inline]
    pub fn should_grow(&self) -> bool {
        self.size >= self.buckets.num_buckets >> 1
    }

    #[inline]
    pub fn is_unused(&self, bucket: Bucket) -> bool {
        !self.buckets.has_node(bucket.0)
    }

    /// Node at an occupied bucket. Panics if the bucket is empty.
    pub fn node(&self, bucket: Bucket) -> &N {
        self.buckets.node(bucket.0)
    }

    pub fn node_mut(&mut self, bucket: Bucket) -> &mut N {
        self.buckets.node_mut(bucket.0)
    }

    /// `None` for an empty bucket.
    pub fn get(&self, bucket: Bucket) -> Option<&N> {
        self.buckets
            .has_node(bucket.0)
            .then(|| self.buckets.node(bucket.0))
    }

    /// Fills an empty bucket handed out by [`find_or_insert`](Self::find_or_insert).
    ///
    /// `node`'s key must be the key that was looked up, and no other
    /// mutation may happen in between.
    pub fn insert_node(&mut self, bucket: Bucket, node: N) -> &mut N {
        debug_assert!(self.is_unused(bucket), "bucket {} already occupied", bucket.0);
        self.size += 1;
        self.buckets.insert_at(bucket.0, node)
    }

    /// First occupied bucket, or `None` for an empty table.
    pub fn first(&self) -> Option<Bucket> {
        self.buckets.next_occupied(0).map(Bucket)
    }

    /// Next occupied bucket after `bucket`; `None` at the end of the table.
    pub fn next(&self, bucket: Bucket) -> Option<Bucket> {
        self.buckets.next_occupied(bucket.0 + 1).map(Bucket)
    }

    /// Nodes in bucket order.
    pub fn iter(&self) -> Iter<'_, N> {
        Iter {
            spans: &self.buckets.spans,
            bucket: 0,
            remaining: self.size,
        }
    }

    /// Mutable access to every node; order is unspecified.
    pub fn iter_mut(&mut self) -> IterMut<'_, N> {
        IterMut {
            spans: self.buckets.spans.iter_mut(),
            current: None,
            remaining: self.size,
        }
    }

    /// Removes every node, shrinking back to one span.
    pub fn clear(&mut self) {
        let old = mem::replace(
            &mut self.buckets,
            SpanArray {
                spans: vec![Span::new()],
                num_buckets: NENTRIES,
            },
        );
        self.size = 0;
        // Nodes drop after the table is consistent again.
        drop(old);
    }

    /// Takes every node out, leaving the table empty with one span.
    pub fn drain(&mut self) -> IntoIter<N> {
        let mut fresh = vec![Span::new()];
        mem::swap(&mut self.buckets.spans, &mut fresh);
        self.buckets.num_buckets = NENTRIES;
        let remaining = mem::take(&mut self.size);
        IntoIter {
            spans: fresh.into_iter(),
            current: None,
            remaining,
        }
    }
}

impl<N: Node, S: BuildHasher> RawTable<N, S> {
    #[inline]
    fn hash_key<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Bucket holding `key`, or the empty bucket that ends its probe.
    pub fn find_bucket<Q>(&self, key: &Q) -> Bucket
    where
        N::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_key(key);
        Bucket(self.buckets.probe(hash, |n| n.key().borrow() == key))
    }

    /// Occupied bucket holding `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<Bucket>
    where
        N::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let b = self.find_bucket(key);
        (!self.is_unused(b)).then_some(b)
    }

    pub fn find_node<Q>(&self, key: &Q) -> Option<&N>
    where
        N::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(key).map(|b| self.node(b))
    }

    pub fn find_node_mut<Q>(&mut self, key: &Q) -> Option<&mut N>
    where
        N::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let b = self.find(key)?;
        Some(self.node_mut(b))
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        N::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(key).is_some()
    }

    /// Looks `key` up and, if absent, makes room for it.
    ///
    /// When the key is missing and the table is at its load threshold, the
    /// table is rehashed for `len() + 1` nodes before the empty bucket is
    /// located, so cursors taken earlier are invalid afterwards.
    pub fn find_or_insert<Q>(&mut self, key: &Q) -> InsertionResult
    where
        N::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_key(key);
        let i = self.buckets.probe(hash, |n| n.key().borrow() == key);
        if self.buckets.has_node(i) {
            return InsertionResult {
                bucket: Bucket(i),
                initialized: true,
            };
        }
        if !self.should_grow() {
            return InsertionResult {
                bucket: Bucket(i),
                initialized: false,
            };
        }
        self.rehash(self.size + 1);
        InsertionResult {
            bucket: Bucket(self.buckets.probe(hash, |_| false)),
            initialized: false,
        }
    }

    /// Removes the node at an occupied bucket and repairs the probe chain.
    ///
    /// The node is handed back once the table is consistent again, so its
    /// destructor may safely use the table.
    pub fn erase(&mut self, bucket: Bucket) -> N {
        debug_assert!(!self.is_unused(bucket), "erase of empty bucket {}", bucket.0);
        let _section = self.guard.enter();
        let node = self.buckets.spans[bucket.span()].erase(bucket.local());
        self.size -= 1;
        self.buckets.close_gap(&self.hasher, bucket.0);
        node
    }

    /// Erases the node at `bucket` and returns where iteration continues.
    ///
    /// Back-shift may refill `bucket` with a node not visited yet, in which
    /// case the same bucket is returned. A node pulled across the wrap-around
    /// point from the start of the table may be visited twice; use
    /// [`retain`](Self::retain) when exactly-once matters.
    pub fn erase_and_advance(&mut self, bucket: Bucket) -> (N, Option<Bucket>) {
        let node = self.erase(bucket);
        let last = bucket.0 == self.buckets.num_buckets - 1;
        let next = if last || self.is_unused(bucket) {
            self.next(bucket)
        } else {
            Some(bucket)
        };
        (node, next)
    }

    /// Removes the node with `key`.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<N>
    where
        N::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let b = self.find(key)?;
        Some(self.erase(b))
    }

    /// Keeps the nodes for which `keep` returns true; each node is offered
    /// exactly once.
    pub fn retain(&mut self, mut keep: impl FnMut(&mut N) -> bool) {
        if self.size == 0 {
            return;
        }
        // Clusters never contain an empty bucket and erasure never fills
        // one, so walking from one empty bucket back to it sees every node
        // once even though back-shift moves nodes toward the walk.
        let Some(start) = self.buckets.first_unused() else {
            return;
        };
        let mask = self.buckets.mask();
        let mut pos = (start + 1) & mask;
        while pos != start {
            if self.buckets.has_node(pos) && !keep(self.buckets.node_mut(pos)) {
                drop(self.erase(Bucket(pos)));
                continue;
            }
            pos = (pos + 1) & mask;
        }
    }

    /// Rebuilds the table for `max(len(), size_hint)` nodes.
    ///
    /// Every node's bucket is recomputed from its key. Panics with
    /// "capacity overflow" if the bucket count is not addressable.
    pub fn rehash(&mut self, size_hint: usize) {
        if let Err(e) = self.try_rehash(size_hint) {
            fatal::<N>(e);
        }
    }

    pub fn try_rehash(&mut self, size_hint: usize) -> Result<(), TryReserveError> {
        let capacity = size_hint.max(self.size);
        let fresh = SpanArray::allocate(buckets_for_capacity(capacity)?)?;
        let _section = self.guard.enter();
        let old = mem::replace(&mut self.buckets, fresh);
        log::debug!(
            "rehash: {} -> {} buckets for {} nodes",
            old.num_buckets,
            self.buckets.num_buckets,
            self.size
        );
        for span in old.spans {
            for node in span.into_nodes() {
                self.buckets.place(&self.hasher, node);
            }
        }
        Ok(())
    }

    /// Makes room for `capacity` nodes in total.
    pub fn reserve(&mut self, capacity: usize) {
        if let Err(e) = self.try_reserve(capacity) {
            fatal::<N>(e);
        }
    }

    pub fn try_reserve(&mut self, capacity: usize) -> Result<(), TryReserveError> {
        if buckets_for_capacity(capacity)? > self.buckets.num_buckets {
            self.try_rehash(capacity)?;
        }
        Ok(())
    }

    /// Shrinks to the smallest bucket count that fits the current nodes.
    pub fn shrink_to_fit(&mut self) {
        match buckets_for_capacity(self.size) {
            Ok(n) if n < self.buckets.num_buckets => self.rehash(0),
            _ => {}
        }
    }

    /// Copy that rehashes into a table sized for `max(len(), capacity)`.
    pub fn clone_with_capacity(&self, capacity: usize) -> Self
    where
        N: Clone,
        S: Clone,
    {
        let mut out = Self::with_capacity_and_hasher(capacity.max(self.size), self.hasher.clone());
        {
            let _section = out.guard.enter();
            for node in self.iter() {
                out.buckets.place(&out.hasher, node.clone());
            }
        }
        out.size = self.size;
        out
    }

    /// Checks every structural invariant. O(n); meant for tests and
    /// debugging.
    pub fn validate(&self) -> Result<(), String> {
        let b = &self.buckets;
        if !b.num_buckets.is_power_of_two() || b.num_buckets < NENTRIES {
            return Err(format!("bad bucket count {}", b.num_buckets));
        }
        if b.spans.len() << SHIFT != b.num_buckets {
            return Err(format!("{} spans for {} buckets", b.spans.len(), b.num_buckets));
        }
        let mut live = 0;
        for (i, span) in b.spans.iter().enumerate() {
            live += span.validate().map_err(|e| format!("span {i}: {e}"))?;
        }
        if live != self.size {
            return Err(format!("size {} but {live} live nodes", self.size));
        }
        if live >= b.num_buckets {
            return Err("no empty bucket left".to_string());
        }
        let mask = b.mask();
        for i in (0..b.num_buckets).filter(|&i| b.has_node(i)) {
            let key = b.node(i).key();
            let hash = self.hash_key(key);
            let mut j = hash as usize & mask;
            while j != i {
                if !b.has_node(j) {
                    return Err(format!("bucket {i} unreachable: empty bucket {j} on its probe"));
                }
                j = (j + 1) & mask;
            }
            let found = b.probe(hash, |n| n.key() == key);
            if found != i {
                return Err(format!("key at bucket {i} also found at {found}"));
            }
        }
        Ok(())
    }
}

impl<N: Clone, S: Clone> Clone for RawTable<N, S> {
    /// Detached copy with every node in the same bucket.
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            size: self.size,
            hasher: self.hasher.clone(),
            guard: RestructureGuard::new(),
        }
    }
}

impl<N: core::fmt::Debug, S> core::fmt::Debug for RawTable<N, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<N, S> IntoIterator for RawTable<N, S> {
    type Item = N;
    type IntoIter = IntoIter<N>;
    fn into_iter(self) -> IntoIter<N> {
        IntoIter {
            spans: self.buckets.spans.into_iter(),
            current: None,
            remaining: self.size,
        }
    }
}

impl<'a, N, S> IntoIterator for &'a RawTable<N, S> {
    type Item = &'a N;
    type IntoIter = Iter<'a, N>;
    fn into_iter(self) -> Iter<'a, N> {
        self.iter()
    }
}

#[cold]
#[inline(never)]
fn fatal<N>(e: TryReserveError) -> ! {
    match e {
        TryReserveError::CapacityOverflow => capacity_overflow(),
        TryReserveError::AllocError { buckets } => {
            match std::alloc::Layout::array::<Span<N>>(buckets >> SHIFT) {
                Ok(layout) => std::alloc::handle_alloc_error(layout),
                Err(_) => capacity_overflow(),
            }
        }
    }
}

/// Iterator over nodes in bucket order.
pub struct Iter<'a, N> {
    spans: &'a [Span<N>],
    bucket: usize,
    remaining: usize,
}

impl<'a, N> Iterator for Iter<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<&'a N> {
        if self.remaining == 0 {
            return None;
        }
        let total = self.spans.len() << SHIFT;
        while self.bucket < total {
            let span = &self.spans[self.bucket >> SHIFT];
            let local = self.bucket & LOCAL_BUCKET_MASK;
            self.bucket += 1;
            if span.has_node(local) {
                self.remaining -= 1;
                return Some(span.at(local));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<N> ExactSizeIterator for Iter<'_, N> {}

pub struct IterMut<'a, N> {
    spans: core::slice::IterMut<'a, Span<N>>,
    current: Option<span::NodesMut<'a, N>>,
    remaining: usize,
}

impl<'a, N> Iterator for IterMut<'a, N> {
    type Item = &'a mut N;

    fn next(&mut self) -> Option<&'a mut N> {
        loop {
            if let Some(n) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining -= 1;
                return Some(n);
            }
            self.current = Some(self.spans.next()?.nodes_mut());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<N> ExactSizeIterator for IterMut<'_, N> {}

/// Owning iterator in bucket order.
pub struct IntoIter<N> {
    spans: std::vec::IntoIter<Span<N>>,
    current: Option<span::IntoNodes<N>>,
    remaining: usize,
}

impl<N> Iterator for IntoIter<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        loop {
            if let Some(n) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining -= 1;
                return Some(n);
            }
            self.current = Some(self.spans.next()?.into_nodes());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<N> ExactSizeIterator for IntoIter<N> {}
