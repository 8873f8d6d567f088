//! Error types surfaced by the fallible parts of the crate.

use thiserror::Error;

/// Failure to grow a table to a requested capacity.
///
/// The infallible entry points (`reserve`, growth during insertion) turn
/// this into a panic; there is no smaller bucket count that would keep the
/// addressing invariant intact.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TryReserveError {
    /// The bucket count for the request does not fit the addressable range.
    #[error("capacity overflow")]
    CapacityOverflow,
    /// The span array for `buckets` buckets could not be allocated.
    #[error("failed to allocate span array for {buckets} buckets")]
    AllocError { buckets: usize },
}

/// Why a value of the seed override variable was not honored as written.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SeedOverrideError {
    #[error("forced seed value {0:?} is not a decimal integer; ignored")]
    NotNumeric(String),
    #[error("forced seed value is not 0 ({0}); using 0")]
    NonZero(u64),
}

#[inline(never)]
#[cold]
pub(crate) fn capacity_overflow() -> ! {
    panic!("capacity overflow")
}
