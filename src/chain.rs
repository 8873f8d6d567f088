//! ValueChain: the per-key value list of a multi-valued table.
//!
//! A singly linked list, most recently inserted value first. Dropping and
//! cloning walk the list iteratively so long chains cannot overflow the
//! stack.

struct Link<V> {
    value: V,
    next: Option<Box<Link<V>>>,
}

pub struct ValueChain<V> {
    head: Option<Box<Link<V>>>,
}

impl<V> ValueChain<V> {
    /// A chain holding a single value.
    pub fn new(value: V) -> Self {
        Self {
            head: Some(Box::new(Link { value, next: None })),
        }
    }

    /// Prepends `value`. O(1).
    pub fn push_front(&mut self, value: V) {
        let next = self.head.take();
        self.head = Some(Box::new(Link { value, next }));
    }

    /// Removes and returns the most recent value.
    pub fn pop_front(&mut self) -> Option<V> {
        self.head.take().map(|link| {
            let Link { value, next } = *link;
            self.head = next;
            value
        })
    }

    pub fn first(&self) -> Option<&V> {
        self.head.as_deref().map(|l| &l.value)
    }

    pub fn first_mut(&mut self) -> Option<&mut V> {
        self.head.as_deref_mut().map(|l| &mut l.value)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of values. O(n).
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Values from most to least recent.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            next: self.head.as_deref_mut(),
        }
    }

    /// Linear search.
    pub fn contains(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.iter().any(|v| v == value)
    }

    /// Unlinks every value equal to `value`; returns how many were removed.
    pub fn remove_all(&mut self, value: &V) -> usize
    where
        V: PartialEq,
    {
        let mut removed = 0;
        let mut cursor = &mut self.head;
        loop {
            let matches = match cursor.as_deref() {
                None => break,
                Some(link) => link.value == *value,
            };
            if matches {
                let next = cursor.as_mut().and_then(|link| link.next.take());
                *cursor = next;
                removed += 1;
            } else if let Some(link) = cursor {
                cursor = &mut link.next;
            }
        }
        removed
    }

    /// Destroys every value and reports how many there were.
    pub fn free(mut self) -> usize {
        self.clear()
    }

    fn clear(&mut self) -> usize {
        let mut count = 0;
        let mut next = self.head.take();
        while let Some(mut link) = next {
            next = link.next.take();
            count += 1;
        }
        count
    }
}

impl<V> Drop for ValueChain<V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<V: Clone> Clone for ValueChain<V> {
    fn clone(&self) -> Self {
        let mut out = ValueChain { head: None };
        let mut tail = &mut out.head;
        for v in self.iter() {
            let link = tail.insert(Box::new(Link {
                value: v.clone(),
                next: None,
            }));
            tail = &mut link.next;
        }
        out
    }
}

/// Chains are equal when they hold equal values in the same order.
impl<V: PartialEq> PartialEq for ValueChain<V> {
    fn eq(&self, other: &Self) -> bool {
        let (mut a, mut b) = (self.iter(), other.iter());
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if x == y => {}
                _ => return false,
            }
        }
    }
}

impl<V: Eq> Eq for ValueChain<V> {}

impl<V: core::fmt::Debug> core::fmt::Debug for ValueChain<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

pub struct Iter<'a, V> {
    next: Option<&'a Link<V>>,
}

impl<V> Iter<'_, V> {
    pub(crate) fn empty() -> Self {
        Iter { next: None }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|link| {
            self.next = link.next.as_deref();
            &link.value
        })
    }
}

pub struct IterMut<'a, V> {
    next: Option<&'a mut Link<V>>,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut V;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.next.take().map(|link| {
            self.next = link.next.as_deref_mut();
            &mut link.value
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn equality_is_ordered_and_length_sensitive() {
        let mut a = ValueChain::new(1);
        a.push_front(2);
        let mut b = ValueChain::new(1);
        b.push_front(2);
        assert_eq!(a, b);

        let mut swapped = ValueChain::new(2);
        swapped.push_front(1);
        assert_ne!(a, swapped);

        b.push_front(3);
        assert_ne!(a, b);
        assert_ne!(b, a);
        assert_eq!(b.clone(), b);
    }

    #[test]
    fn most_recent_first() {
        let mut c = ValueChain::new(1);
        c.push_front(2);
        c.push_front(3);
        assert_eq!(c.iter().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(c.first(), Some(&3));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn free_reports_count_and_drops_values() {
        let drops = Rc::new(Cell::new(0));
        struct D(Rc<Cell<usize>>);
        impl Drop for D {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }
        let mut c = ValueChain::new(D(drops.clone()));
        for _ in 0..4 {
            c.push_front(D(drops.clone()));
        }
        assert_eq!(c.free(), 5);
        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn remove_all_unlinks_matches_anywhere() {
        let mut c = ValueChain::new(7);
        for v in [1, 7, 2, 7] {
            c.push_front(v);
        }
        // [7, 2, 7, 1, 7]
        assert_eq!(c.remove_all(&7), 3);
        assert_eq!(c.iter().copied().collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(c.remove_all(&9), 0);
        assert!(c.contains(&1));
        assert!(!c.contains(&7));
    }

    #[test]
    fn pop_front_until_empty() {
        let mut c = ValueChain::new("a");
        c.push_front("b");
        assert_eq!(c.pop_front(), Some("b"));
        assert_eq!(c.pop_front(), Some("a"));
        assert_eq!(c.pop_front(), None);
        assert!(c.is_empty());
    }

    #[test]
    fn clone_preserves_order() {
        let mut c = ValueChain::new(1);
        c.push_front(2);
        for v in c.iter_mut() {
            *v *= 10;
        }
        let d = c.clone();
        assert_eq!(d.iter().copied().collect::<Vec<_>>(), vec![20, 10]);
    }

    #[test]
    fn long_chain_drop_does_not_recurse() {
        let mut c = ValueChain::new(0u32);
        for i in 1..200_000 {
            c.push_front(i);
        }
        drop(c);
    }
}
