//! span-hashmap: an open-addressing hash table with span-segmented bucket
//! storage, back-shift deletion, and seeded hashing.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a table engine whose pieces can be checked independently, with
//!   unique-key, set, and multi-valued containers layered on top.
//! - Layers:
//!   - Seeding (`seed`): one process-wide pair of seeds, initialized
//!     lazily and lock-free, overridable to deterministic mode through the
//!     `SPANHASH_SEED` environment variable.
//!   - Mixing (`mixer`, `murmur`, `siphash`, `aes`): bytes plus a seed in,
//!     `u64` out. Picks AES rounds, MurmurHash2 or SipHash-1-2 depending on
//!     CPU support, input length and seed.
//!   - Storage (`span`): 128-bucket spans with one-byte offsets into a
//!     per-span node arena and an in-place free list.
//!   - Table (`raw_table`): linear probing over the span array, growth at
//!     50% load, tombstone-free erase, bucket cursors.
//!   - Containers (`hash_map`, `hash_set`, `multi_map`): thin typed shells;
//!     the multi-map hangs a `ValueChain` off each key's node.
//!
//! Constraints
//! - Bucket counts are powers of two, never below one span (128).
//! - At most half the buckets are occupied after any insertion, so every
//!   probe ends at an empty bucket.
//! - An offset byte is either `0xff` or the index of an occupied arena
//!   slot; a slot is on the free list or occupied, never both.
//! - Every stored key is reachable by probing forward from its ideal
//!   bucket without crossing an empty bucket.
//!
//! Reentrancy policy
//! - Rehash and erase repair call `K: Hash` while nodes are between
//!   buckets. A debug-only guard panics if the same table is restructured
//!   again from inside that window.
//! - Erase hands the removed node back to the caller, so `Drop` for keys
//!   and values runs once the table is consistent and may use it freely.
//!
//! Hashing and seeds
//! - Keys are hashed through `SeededState`, a `BuildHasher` that carries
//!   the table's seed and mixer. Each table copies the global seed when it
//!   is created; reseeding the authority affects only later tables.
//! - Seed 0 selects the portable mixers and folds the input length into
//!   the secondary seed, so deterministic layouts match on every host of
//!   the same pointer width. The word-sized Murmur variant and the
//!   Murmur/SipHash cutoff both follow `usize`.
//!
//! Notes and non-goals
//! - Not internally synchronized. Sharing and copy-on-write are the
//!   caller's business; `Clone` is a full detached copy.
//! - Iteration order is bucket order and carries no meaning.
//! - Hash codes are not stable across versions and are not suitable for
//!   persistence.

pub mod aes;
pub mod chain;
mod error;
pub mod hash_map;
pub mod hash_set;
pub mod mixer;
pub mod multi_map;
pub mod murmur;
pub mod node;
pub mod raw_table;
mod raw_table_proptest;
mod reentrancy;
pub mod seed;
pub mod siphash;
pub mod span;

// Public surface
pub use chain::ValueChain;
pub use error::{SeedOverrideError, TryReserveError};
pub use hash_map::SpanHashMap;
pub use hash_set::SpanHashSet;
pub use mixer::{Mixer, SeededState, SpanHasher};
pub use multi_map::SpanMultiMap;
pub use raw_table::{Bucket, InsertionResult, RawTable};
pub use seed::{HashSeed, SeedAuthority, SeedState, SEED_ENV_VAR};
