//! Debug-only guard for the table's restructuring sections.
//!
//! Rehashing and back-shift repair call `K: Hash` while nodes are between
//! buckets. A `Hash` impl that reaches back into the same table (through a
//! raw pointer or interior mutability) would see a half-moved structure.
//! Debug builds turn that into a panic; release builds carry no state.
//!
//! The flag is an `AtomicBool` rather than a `Cell` so tables stay `Sync`
//! and can be shared behind an `Arc` by copy-on-write shells.

#[cfg(debug_assertions)]
use core::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub(crate) struct RestructureGuard {
    #[cfg(debug_assertions)]
    busy: AtomicBool,
}

impl RestructureGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: AtomicBool::new(false),
        }
    }

    /// Marks the start of a restructuring section; the section ends when the
    /// returned value is dropped.
    #[inline]
    pub(crate) fn enter(&self) -> Section<'_> {
        #[cfg(debug_assertions)]
        {
            let was_busy = self.busy.swap(true, Ordering::Acquire);
            assert!(!was_busy, "table re-entered while it was being restructured");
        }
        Section { _owner: self }
    }

    #[cfg(all(test, debug_assertions))]
    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }
}

pub(crate) struct Section<'a> {
    _owner: &'a RestructureGuard,
}

impl Drop for Section<'_> {
    #[inline]
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self._owner.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::RestructureGuard;

    #[test]
    fn sections_can_follow_each_other() {
        let g = RestructureGuard::new();
        drop(g.enter());
        let _s = g.enter();
    }

    #[cfg(debug_assertions)]
    #[test]
    fn nested_section_panics() {
        let g = RestructureGuard::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _outer = g.enter();
            let _inner = g.enter();
        }));
        assert!(res.is_err(), "nested section must panic in debug builds");
    }

    #[cfg(debug_assertions)]
    #[test]
    fn unwinding_out_of_a_section_clears_it() {
        let g = RestructureGuard::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _s = g.enter();
            assert!(g.is_busy());
            panic!("hash panicked mid-rehash");
        }));
        assert!(!g.is_busy());
        let _s = g.enter();
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn nested_section_is_free_in_release() {
        let g = RestructureGuard::new();
        let _a = g.enter();
        let _b = g.enter();
    }
}
