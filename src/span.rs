//! Span: a 128-bucket segment of a table.
//!
//! Each bucket is one byte: [`UNUSED`] or the index of a slot in the span's
//! own slot arena. Slots are either occupied by a node or linked into the
//! span's free list, never both. The arena grows 48 → 80 → +16 slots, so a
//! span filled to the table's 50% load factor is resized at most once.

use core::mem;

pub const SHIFT: u32 = 7;
/// Buckets per span.
pub const NENTRIES: usize = 1 << SHIFT;
pub const LOCAL_BUCKET_MASK: usize = NENTRIES - 1;
/// Offset value of an empty bucket.
pub const UNUSED: u8 = 0xff;
/// Hard ceiling on slots per span imposed by the one-byte offsets.
pub const MAX_SLOTS: usize = UNUSED as usize - 1;

const _: () = assert!(NENTRIES <= MAX_SLOTS);
const _: () = assert!(NENTRIES % 8 == 0);

#[derive(Clone, Debug)]
enum Slot<N> {
    Free { next: u8 },
    Occupied(N),
}

/// Arena size after growing from `allocated` slots.
pub(crate) fn next_allocation(allocated: usize) -> usize {
    if allocated == 0 {
        NENTRIES / 8 * 3
    } else if allocated == NENTRIES / 8 * 3 {
        NENTRIES / 8 * 5
    } else {
        allocated + NENTRIES / 8
    }
}

#[derive(Clone, Debug)]
pub struct Span<N> {
    offsets: [u8; NENTRIES],
    slots: Vec<Slot<N>>,
    // Equal to `slots.len()` when the free list is empty.
    next_free: u8,
}

impl<N> Default for Span<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> Span<N> {
    pub const fn new() -> Self {
        Self {
            offsets: [UNUSED; NENTRIES],
            slots: Vec::new(),
            next_free: 0,
        }
    }

    #[inline]
    pub fn offset(&self, i: usize) -> u8 {
        self.offsets[i]
    }

    #[inline]
    pub fn has_node(&self, i: usize) -> bool {
        self.offsets[i] != UNUSED
    }

    /// Allocated arena slots (live plus free).
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }

    /// Live nodes.
    pub fn len(&self) -> usize {
        self.offsets.iter().filter(|&&o| o != UNUSED).count()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.iter().all(|&o| o == UNUSED)
    }

    pub fn at(&self, i: usize) -> &N {
        match &self.slots[self.offsets[i] as usize] {
            Slot::Occupied(n) => n,
            Slot::Free { .. } => unoccupied(i),
        }
    }

    pub fn at_mut(&mut self, i: usize) -> &mut N {
        match &mut self.slots[self.offsets[i] as usize] {
            Slot::Occupied(n) => n,
            Slot::Free { .. } => unoccupied(i),
        }
    }

    /// Stores `node` in empty bucket `i`.
    pub fn insert(&mut self, i: usize, node: N) -> &mut N {
        debug_assert!(!self.has_node(i), "bucket {i} already occupied");
        let slot = self.claim_slot();
        self.offsets[i] = slot;
        let entry = &mut self.slots[slot as usize];
        *entry = Slot::Occupied(node);
        match entry {
            Slot::Occupied(n) => n,
            Slot::Free { .. } => unreachable!(),
        }
    }

    /// Empties bucket `i`, returning its node; the slot joins the free list.
    pub fn erase(&mut self, i: usize) -> N {
        debug_assert!(self.has_node(i), "bucket {i} is not occupied");
        let slot = self.offsets[i];
        self.offsets[i] = UNUSED;
        let old = mem::replace(
            &mut self.slots[slot as usize],
            Slot::Free {
                next: self.next_free,
            },
        );
        self.next_free = slot;
        match old {
            Slot::Occupied(n) => n,
            Slot::Free { .. } => unoccupied(i),
        }
    }

    /// Moves the node of bucket `from` to empty bucket `to` of this span.
    /// The node stays in its slot; only the offset moves.
    pub fn move_local(&mut self, from: usize, to: usize) {
        debug_assert!(self.has_node(from));
        debug_assert!(!self.has_node(to));
        self.offsets[to] = self.offsets[from];
        self.offsets[from] = UNUSED;
    }

    /// Moves the node of bucket `from` in `other` to empty bucket `to` here,
    /// freeing the source slot.
    pub fn move_from_span(&mut self, other: &mut Span<N>, from: usize, to: usize) {
        debug_assert!(other.has_node(from));
        let node = other.erase(from);
        self.insert(to, node);
    }

    /// Drops every node and releases the arena.
    pub fn clear(&mut self) {
        self.offsets = [UNUSED; NENTRIES];
        self.slots = Vec::new();
        self.next_free = 0;
    }

    /// Takes the nodes out in bucket order.
    pub fn into_nodes(self) -> IntoNodes<N> {
        IntoNodes {
            span: self,
            local: 0,
        }
    }

    /// Mutable access to the live nodes in arena order.
    pub fn nodes_mut(&mut self) -> NodesMut<'_, N> {
        NodesMut {
            slots: self.slots.iter_mut(),
        }
    }

    fn claim_slot(&mut self) -> u8 {
        if self.next_free as usize == self.slots.len() {
            self.grow();
        }
        let slot = self.next_free;
        match self.slots[slot as usize] {
            Slot::Free { next } => self.next_free = next,
            Slot::Occupied(_) => unreachable!("free list points at a live slot"),
        }
        slot
    }

    fn grow(&mut self) {
        let old = self.slots.len();
        let new = next_allocation(old);
        assert!(new <= MAX_SLOTS, "span arena exceeds {MAX_SLOTS} slots");
        log::trace!("span arena grows from {old} to {new} slots");
        self.slots.reserve_exact(new - old);
        // `new <= MAX_SLOTS`, so every index fits the one-byte encoding.
        self.slots
            .extend((old + 1..=new).map(|next| Slot::Free { next: next as u8 }));
        self.next_free = old as u8;
    }

    /// Checks offsets and free list; returns the live count.
    pub(crate) fn validate(&self) -> Result<usize, String> {
        let mut owner = vec![None; self.slots.len()];
        for (i, &o) in self.offsets.iter().enumerate() {
            if o == UNUSED {
                continue;
            }
            let o = o as usize;
            match self.slots.get(o) {
                Some(Slot::Occupied(_)) => {}
                Some(Slot::Free { .. }) => return Err(format!("bucket {i} maps to free slot {o}")),
                None => return Err(format!("bucket {i} maps past the arena ({o})")),
            }
            if let Some(prev) = owner[o].replace(i) {
                return Err(format!("buckets {prev} and {i} share slot {o}"));
            }
        }
        let live = owner.iter().filter(|x| x.is_some()).count();
        let mut free = 0;
        let mut cursor = self.next_free as usize;
        while cursor != self.slots.len() {
            match self.slots.get(cursor) {
                Some(Slot::Free { next }) => {
                    free += 1;
                    if free > self.slots.len() {
                        return Err("free list has a cycle".to_string());
                    }
                    cursor = *next as usize;
                }
                _ => return Err(format!("free list reaches non-free slot {cursor}")),
            }
        }
        if live + free != self.slots.len() {
            return Err(format!(
                "{live} live + {free} free != {} allocated",
                self.slots.len()
            ));
        }
        Ok(live)
    }
}

#[cold]
#[inline(never)]
fn unoccupied(i: usize) -> ! {
    panic!("bucket {i} is not occupied")
}

/// Owning iterator over a span's nodes in bucket order.
pub struct IntoNodes<N> {
    span: Span<N>,
    local: usize,
}

impl<N> Iterator for IntoNodes<N> {
    type Item = N;
    fn next(&mut self) -> Option<N> {
        while self.local < NENTRIES {
            let i = self.local;
            self.local += 1;
            if self.span.has_node(i) {
                return Some(self.span.erase(i));
            }
        }
        None
    }
}

pub struct NodesMut<'a, N> {
    slots: core::slice::IterMut<'a, Slot<N>>,
}

impl<'a, N> Iterator for NodesMut<'a, N> {
    type Item = &'a mut N;
    fn next(&mut self) -> Option<&'a mut N> {
        self.slots.find_map(|slot| match slot {
            Slot::Occupied(n) => Some(n),
            Slot::Free { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_schedule() {
        assert_eq!(next_allocation(0), 48);
        assert_eq!(next_allocation(48), 80);
        assert_eq!(next_allocation(80), 96);
        assert_eq!(next_allocation(112), NENTRIES);
        let mut n = 0;
        while n < NENTRIES {
            n = next_allocation(n);
        }
        assert_eq!(n, NENTRIES);
        assert!(n <= MAX_SLOTS);
        assert_eq!(MAX_SLOTS, 254);
    }

    #[test]
    fn insert_erase_reuses_slots() {
        let mut s: Span<u32> = Span::new();
        assert_eq!(s.allocated(), 0);
        s.insert(5, 50);
        assert_eq!(s.allocated(), 48);
        assert!(s.has_node(5));
        assert_eq!(*s.at(5), 50);
        let slot = s.offset(5);
        assert_eq!(s.erase(5), 50);
        assert!(!s.has_node(5));
        s.insert(9, 90);
        assert_eq!(s.offset(9), slot, "freed slot is reused first");
        assert_eq!(s.validate(), Ok(1));
    }

    #[test]
    fn fills_every_bucket() {
        let mut s: Span<usize> = Span::new();
        for i in 0..NENTRIES {
            s.insert(i, i * 2);
        }
        assert_eq!(s.allocated(), NENTRIES);
        assert_eq!(s.len(), NENTRIES);
        for i in 0..NENTRIES {
            assert_eq!(*s.at(i), i * 2);
        }
        assert_eq!(s.validate(), Ok(NENTRIES));
    }

    #[test]
    fn move_local_remaps_only_the_offset() {
        let mut s: Span<&str> = Span::new();
        s.insert(3, "x");
        let slot = s.offset(3);
        s.move_local(3, 1);
        assert!(!s.has_node(3));
        assert_eq!(s.offset(1), slot);
        assert_eq!(*s.at(1), "x");
        assert_eq!(s.validate(), Ok(1));
    }

    #[test]
    fn move_from_span_frees_source_slot() {
        let mut a: Span<String> = Span::new();
        let mut b: Span<String> = Span::new();
        a.insert(0, "moved".to_string());
        a.insert(1, "stays".to_string());
        b.move_from_span(&mut a, 0, 127);
        assert!(!a.has_node(0));
        assert_eq!(b.at(127), "moved");
        assert_eq!(a.validate(), Ok(1));
        assert_eq!(b.validate(), Ok(1));
    }

    #[test]
    fn into_nodes_in_bucket_order() {
        let mut s: Span<u8> = Span::new();
        for i in [7usize, 2, 100, 0] {
            s.insert(i, i as u8);
        }
        let v: Vec<u8> = s.into_nodes().collect();
        assert_eq!(v, vec![0, 2, 7, 100]);
    }

    #[test]
    fn nodes_mut_skips_free_slots() {
        let mut s: Span<u32> = Span::new();
        for i in 0..5 {
            s.insert(i, i as u32);
        }
        s.erase(2);
        for n in s.nodes_mut() {
            *n += 100;
        }
        let mut live: Vec<u32> = s.nodes_mut().map(|n| *n).collect();
        live.sort_unstable();
        assert_eq!(live, vec![100, 101, 103, 104]);
    }

    #[test]
    fn clear_releases_arena() {
        let mut s: Span<u8> = Span::new();
        s.insert(1, 1);
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.allocated(), 0);
        assert_eq!(s.validate(), Ok(0));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn insert_into_occupied_bucket_panics() {
        let res = std::panic::catch_unwind(|| {
            let mut s: Span<u8> = Span::new();
            s.insert(1, 1);
            s.insert(1, 2);
        });
        assert!(res.is_err());
    }
}
