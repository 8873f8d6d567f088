//! Seed authority: process-wide hash seeds, lazily generated once.
//!
//! An authority holds two independent 64-bit seeds. Both are generated
//! together from the operating system's secure random source on the first
//! read. Setting the override variable (`SPANHASH_SEED` by default) to a
//! number switches the authority into deterministic mode instead: the seed
//! is pinned to 0, `reset_seed` becomes a no-op and mixers stay on their
//! portable paths.
//!
//! All state is kept in atomics. Initialization is a race that any thread
//! may win; every slot is claimed with a compare-exchange, so losers adopt
//! the winner's values and nobody blocks.

use crate::error::SeedOverrideError;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Default name of the deterministic-mode override variable.
pub const SEED_ENV_VAR: &str = "SPANHASH_SEED";

const SEED_COUNT: usize = 2;

// Marks a seed slot that has not been claimed yet. A random draw equal to
// it is remapped, so it never escapes as a real seed.
const UNSET: u64 = 0x5555_5555_5555_5555;

const UNINITIALIZED: u8 = 0;
const OVERRIDDEN: u8 = 1;
const INITIALIZED: u8 = 2;

/// Observable state of an authority as reported by [`SeedAuthority::state`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SeedState {
    /// Deterministic mode was requested; the seed is pinned to 0.
    OverriddenByEnvironment,
    /// This read generated the seeds.
    JustInitialized,
    /// Seeds were generated by an earlier read.
    AlreadyInitialized,
}

/// The seed pair a table hashes with.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct HashSeed {
    pub primary: u64,
    pub secondary: u64,
}

impl HashSeed {
    /// Deterministic seeding.
    pub const ZERO: HashSeed = HashSeed {
        primary: 0,
        secondary: 0,
    };

    pub const fn new(primary: u64, secondary: u64) -> Self {
        Self { primary, secondary }
    }

    pub fn is_deterministic(&self) -> bool {
        self.primary == 0
    }
}

#[derive(Debug)]
enum OverrideSource {
    Env(&'static str),
    Pinned,
}

/// Owner of the two hash seeds.
///
/// Construct one explicitly and hand it to tables, or use the process-wide
/// [`SeedAuthority::global`] instance that the default constructors use.
#[derive(Debug)]
pub struct SeedAuthority {
    seeds: [AtomicU64; SEED_COUNT],
    state: AtomicU8,
    source: OverrideSource,
}

static GLOBAL: SeedAuthority = SeedAuthority::with_env_var(SEED_ENV_VAR);

/// Interprets a value of the override variable.
///
/// `Ok(())` means deterministic mode with the value accepted as written.
/// A non-zero number still selects deterministic mode but is reported;
/// anything else disables the override.
pub fn parse_seed_override(raw: &str) -> Result<(), SeedOverrideError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Ok(()),
        Ok(n) => Err(SeedOverrideError::NonZero(n)),
        Err(_) => Err(SeedOverrideError::NotNumeric(raw.to_string())),
    }
}

impl SeedAuthority {
    /// The process-wide authority, reading [`SEED_ENV_VAR`].
    pub fn global() -> &'static SeedAuthority {
        &GLOBAL
    }

    /// An authority reading [`SEED_ENV_VAR`].
    pub const fn from_env() -> Self {
        Self::with_env_var(SEED_ENV_VAR)
    }

    /// An authority reading the override from `var` on first access.
    pub const fn with_env_var(var: &'static str) -> Self {
        Self {
            seeds: [AtomicU64::new(UNSET), AtomicU64::new(UNSET)],
            state: AtomicU8::new(UNINITIALIZED),
            source: OverrideSource::Env(var),
        }
    }

    /// An authority that behaves as if the override variable were `0`.
    pub const fn deterministic() -> Self {
        Self {
            seeds: [AtomicU64::new(UNSET), AtomicU64::new(UNSET)],
            state: AtomicU8::new(UNINITIALIZED),
            source: OverrideSource::Pinned,
        }
    }

    /// Returns seed `which` (0 or 1), generating both on first use.
    pub fn current_seed(&self, which: usize) -> u64 {
        self.state_for(which).0
    }

    /// Both seeds, in the shape tables consume.
    pub fn hash_seed(&self) -> HashSeed {
        HashSeed::new(self.current_seed(0), self.current_seed(1))
    }

    /// Current state; initializes the authority if nobody has yet.
    pub fn state(&self) -> SeedState {
        self.state_for(0).1
    }

    /// Regenerates the primary seed unless deterministic mode is active.
    ///
    /// Tables created earlier keep the seed they were built with.
    pub fn reset_seed(&self) {
        if self.state() != SeedState::AlreadyInitialized {
            return;
        }
        self.seeds[0].store(random_seeds()[0], Ordering::Relaxed);
    }

    /// Forces the primary seed to 0.
    ///
    /// The authority is initialized first, so later reads do not replace
    /// the zero with a lazily generated value.
    pub fn clear_seed(&self) {
        let _ = self.state();
        self.seeds[0].store(0, Ordering::Relaxed);
    }

    fn state_for(&self, which: usize) -> (u64, SeedState) {
        debug_assert!(which < SEED_COUNT, "seed index out of range: {which}");
        match self.state.load(Ordering::Acquire) {
            INITIALIZED => (
                self.seeds[which].load(Ordering::Relaxed),
                SeedState::AlreadyInitialized,
            ),
            OVERRIDDEN => (0, SeedState::OverriddenByEnvironment),
            _ => self.initialize(which),
        }
    }

    #[cold]
    #[inline(never)]
    fn initialize(&self, which: usize) -> (u64, SeedState) {
        if self.override_requested() {
            let _ = self.state.compare_exchange(
                UNINITIALIZED,
                OVERRIDDEN,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            log::debug!("hash seed pinned to 0 (deterministic mode)");
            return (0, SeedState::OverriddenByEnvironment);
        }

        let fresh = random_seeds();
        for (slot, value) in self.seeds.iter().zip(fresh) {
            let _ = slot.compare_exchange(UNSET, value, Ordering::AcqRel, Ordering::Relaxed);
        }
        let won = self
            .state
            .compare_exchange(UNINITIALIZED, INITIALIZED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        let seed = self.seeds[which].load(Ordering::Relaxed);
        if won {
            log::debug!("hash seeds initialized from secure random source");
            (seed, SeedState::JustInitialized)
        } else {
            (seed, SeedState::AlreadyInitialized)
        }
    }

    fn override_requested(&self) -> bool {
        let var = match self.source {
            OverrideSource::Pinned => return true,
            OverrideSource::Env(var) => var,
        };
        let Ok(raw) = std::env::var(var) else {
            return false;
        };
        match parse_seed_override(&raw) {
            Ok(()) => true,
            Err(e @ SeedOverrideError::NonZero(_)) => {
                log::warn!("{var}: {e}");
                true
            }
            Err(e @ SeedOverrideError::NotNumeric(_)) => {
                log::warn!("{var}: {e}");
                false
            }
        }
    }
}

impl Default for SeedAuthority {
    fn default() -> Self {
        Self::from_env()
    }
}

fn random_seeds() -> [u64; SEED_COUNT] {
    let mut buf = [0u8; 8 * SEED_COUNT];
    if let Err(e) = getrandom::getrandom(&mut buf) {
        log::warn!("secure random source unavailable ({e}); using fallback entropy");
        let state = RandomState::new();
        for (i, chunk) in buf.chunks_exact_mut(8).enumerate() {
            chunk.copy_from_slice(&state.hash_one(i).to_le_bytes());
        }
    }
    let mut out = [0u64; SEED_COUNT];
    for (o, chunk) in out.iter_mut().zip(buf.chunks_exact(8)) {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let v = u64::from_le_bytes(word);
        *o = if v == UNSET { !UNSET } else { v };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_only_zero() {
        assert_eq!(parse_seed_override("0"), Ok(()));
        assert_eq!(parse_seed_override(" 0 "), Ok(()));
        assert_eq!(parse_seed_override("12"), Err(SeedOverrideError::NonZero(12)));
        assert_eq!(
            parse_seed_override("yes"),
            Err(SeedOverrideError::NotNumeric("yes".to_string()))
        );
        assert!(parse_seed_override("").is_err());
    }

    #[test]
    fn first_read_initializes_then_caches() {
        let a = SeedAuthority::with_env_var("SPANHASH_TEST_UNSET_VAR_A");
        assert_eq!(a.state(), SeedState::JustInitialized);
        assert_eq!(a.state(), SeedState::AlreadyInitialized);
        let s0 = a.current_seed(0);
        let s1 = a.current_seed(1);
        assert_eq!(a.current_seed(0), s0);
        assert_eq!(a.current_seed(1), s1);
        assert_ne!(s0, UNSET);
        assert_ne!(s1, UNSET);
    }

    #[test]
    fn pinned_authority_is_deterministic() {
        let a = SeedAuthority::deterministic();
        assert_eq!(a.current_seed(0), 0);
        assert_eq!(a.current_seed(1), 0);
        assert_eq!(a.state(), SeedState::OverriddenByEnvironment);
        a.reset_seed();
        assert_eq!(a.current_seed(0), 0);
        assert_eq!(a.hash_seed(), HashSeed::ZERO);
    }

    #[test]
    fn clear_then_reset() {
        let a = SeedAuthority::with_env_var("SPANHASH_TEST_UNSET_VAR_B");
        let secondary = a.current_seed(1);
        a.clear_seed();
        assert_eq!(a.current_seed(0), 0);
        assert_eq!(a.state(), SeedState::AlreadyInitialized);
        assert!(a.hash_seed().is_deterministic());

        a.reset_seed();
        // 2^-64 chance of a spurious failure.
        assert_ne!(a.current_seed(0), 0);
        assert_eq!(a.current_seed(1), secondary, "reset touches only the primary seed");
    }

    #[test]
    fn concurrent_first_reads_agree() {
        let a = SeedAuthority::with_env_var("SPANHASH_TEST_UNSET_VAR_C");
        let seen: Vec<(u64, u64)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| (a.current_seed(0), a.current_seed(1))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
    }
}
