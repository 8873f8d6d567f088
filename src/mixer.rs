//! Seeded hash mixer: turns bytes plus a [`HashSeed`] into a hash code.
//!
//! Algorithm selection depends on input length and on the [`Mixer`]
//! capability, never on the caller:
//! - AES mixer when the capability is present and the primary seed is
//!   non-zero;
//! - MurmurHash2 for inputs no wider than a machine word;
//! - SipHash-1-2 otherwise.
//!
//! When the primary seed is 0 the secondary seed is replaced by the input
//! length, which keeps deterministic mode reproducible across hosts with and
//! without AES instructions.

use crate::aes;
use crate::murmur::murmur_word;
use crate::seed::{HashSeed, SeedAuthority};
use crate::siphash::siphash_1_2;
use core::hash::{BuildHasher, Hasher};

const WORD_BYTES: usize = core::mem::size_of::<usize>();

/// Mixer capability, resolved once and stored by each table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mixer {
    /// MurmurHash2 and SipHash-1-2 only.
    Portable,
    /// AES mixer for seeded hashing, portable paths for seed 0.
    Aes,
}

impl Mixer {
    /// Picks the AES mixer when the CPU runs AES rounds in hardware.
    pub fn detect() -> Mixer {
        if aes::hardware_available() {
            Mixer::Aes
        } else {
            Mixer::Portable
        }
    }

    /// Hashes `bytes` under `seed`.
    pub fn hash_bytes(self, bytes: &[u8], seed: HashSeed) -> u64 {
        let seed2 = if seed.primary == 0 {
            bytes.len() as u64
        } else {
            seed.secondary
        };
        if self == Mixer::Aes && seed.primary != 0 {
            return aes::aes_hash(bytes, seed.primary, seed2);
        }
        if bytes.len() <= WORD_BYTES {
            murmur_word(bytes, seed.primary)
        } else {
            siphash_1_2(bytes, seed.primary, seed2)
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Mixer::detect()
    }
}

#[inline]
fn combine(state: u64, h: u64) -> u64 {
    state ^ h
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(state << 6)
        .wrapping_add(state >> 2)
}

/// `Hasher` feeding every written chunk through the mixer.
///
/// Integers are written little-endian and `usize` as 64 bits, so a key hashes
/// the same on every host of one pointer width for a given seed and mixer path.
#[derive(Clone, Debug)]
pub struct SpanHasher {
    state: u64,
    seed: HashSeed,
    mixer: Mixer,
}

impl SpanHasher {
    pub fn new(seed: HashSeed, mixer: Mixer) -> Self {
        Self {
            state: seed.primary,
            seed,
            mixer,
        }
    }
}

impl Hasher for SpanHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let h = self.mixer.hash_bytes(bytes, self.seed);
        self.state = combine(self.state, h);
    }

    fn write_u8(&mut self, i: u8) {
        self.write(&[i]);
    }
    fn write_u16(&mut self, i: u16) {
        self.write(&i.to_le_bytes());
    }
    fn write_u32(&mut self, i: u32) {
        self.write(&i.to_le_bytes());
    }
    fn write_u64(&mut self, i: u64) {
        self.write(&i.to_le_bytes());
    }
    fn write_u128(&mut self, i: u128) {
        self.write(&i.to_le_bytes());
    }
    fn write_usize(&mut self, i: usize) {
        self.write(&(i as u64).to_le_bytes());
    }
}

/// `BuildHasher` carrying a seed and a mixer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SeededState {
    seed: HashSeed,
    mixer: Mixer,
}

impl SeededState {
    pub fn new(seed: HashSeed, mixer: Mixer) -> Self {
        Self { seed, mixer }
    }

    /// Seeds from `authority`, mixer from CPU detection.
    pub fn from_authority(authority: &SeedAuthority) -> Self {
        Self::new(authority.hash_seed(), Mixer::detect())
    }

    /// Zero seed on the portable mixer: identical output on every host of the same pointer width.
    pub fn deterministic() -> Self {
        Self::new(HashSeed::ZERO, Mixer::Portable)
    }

    pub fn seed(&self) -> HashSeed {
        self.seed
    }

    pub fn mixer(&self) -> Mixer {
        self.mixer
    }
}

impl Default for SeededState {
    fn default() -> Self {
        Self::from_authority(SeedAuthority::global())
    }
}

impl BuildHasher for SeededState {
    type Hasher = SpanHasher;

    fn build_hasher(&self) -> SpanHasher {
        SpanHasher::new(self.seed, self.mixer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes;
    use crate::murmur::murmur_word;

    const SEEDED: HashSeed = HashSeed::new(0x0123_4567_89ab_cdef, 0xfedc_ba98_7654_3210);

    fn all_mixers() -> [Mixer; 2] {
        [Mixer::Portable, Mixer::Aes]
    }

    #[test]
    fn short_unseeded_input_uses_murmur() {
        for m in all_mixers() {
            assert_eq!(m.hash_bytes(b"abc", HashSeed::ZERO), murmur_word(b"abc", 0));
        }
    }

    // Seed-0 output follows the pointer width: the word-sized Murmur
    // variant and the short-input cutoff both come from `usize`.
    #[cfg(target_pointer_width = "64")]
    #[test]
    fn unseeded_cutoff_on_64_bit_hosts() {
        use crate::murmur::murmur64a;
        let eight = b"8 bytes!";
        assert_eq!(Mixer::Portable.hash_bytes(eight, HashSeed::ZERO), murmur64a(eight, 0));
        let nine = b"nine byte";
        assert_eq!(Mixer::Portable.hash_bytes(nine, HashSeed::ZERO), siphash_1_2(nine, 0, 9));
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn unseeded_cutoff_on_32_bit_hosts() {
        use crate::murmur::murmur2_32;
        assert_eq!(Mixer::Portable.hash_bytes(b"four", HashSeed::ZERO), u64::from(murmur2_32(b"four", 0)));
        assert_eq!(Mixer::Portable.hash_bytes(b"fives", HashSeed::ZERO), siphash_1_2(b"fives", 0, 5));
    }

    #[test]
    fn long_unseeded_input_uses_siphash_keyed_by_length() {
        let input = b"a key longer than one word";
        let expect = siphash_1_2(input, 0, input.len() as u64);
        for m in all_mixers() {
            assert_eq!(m.hash_bytes(input, HashSeed::ZERO), expect);
        }
    }

    #[test]
    fn seeded_input_takes_the_aes_path() {
        let input = b"hello, spans and slots";
        assert_eq!(
            Mixer::Aes.hash_bytes(input, SEEDED),
            aes::aes_hash(input, SEEDED.primary, SEEDED.secondary)
        );
        assert_ne!(Mixer::Aes.hash_bytes(input, SEEDED), Mixer::Portable.hash_bytes(input, SEEDED));
    }

    #[test]
    fn detect_matches_cpu_support() {
        let expect = if aes::hardware_available() { Mixer::Aes } else { Mixer::Portable };
        assert_eq!(Mixer::detect(), expect);
    }

    #[test]
    fn zero_length_is_well_defined_and_seed_dependent() {
        for m in all_mixers() {
            let a = m.hash_bytes(&[], SEEDED);
            assert_eq!(a, m.hash_bytes(&[], SEEDED));
            assert_ne!(a, m.hash_bytes(&[], HashSeed::new(SEEDED.primary ^ 1, SEEDED.secondary)));
        }
    }

    #[test]
    fn equal_keys_hash_equal_through_hasher() {
        for m in all_mixers() {
            for seed in [HashSeed::ZERO, SEEDED] {
                let s = SeededState::new(seed, m);
                let owned = String::from("borrowed-vs-owned");
                assert_eq!(s.hash_one(&owned), s.hash_one("borrowed-vs-owned"));
                assert_eq!(s.hash_one(42u64), s.hash_one(42u64));
            }
        }
    }

    #[test]
    fn usize_hashes_like_u64() {
        let s = SeededState::new(SEEDED, Mixer::Portable);
        let mut a = s.build_hasher();
        a.write_usize(7);
        let mut b = s.build_hasher();
        b.write_u64(7);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn deterministic_state_is_host_independent() {
        // Same seed, different capability: identical results for seed 0.
        let a = SeededState::new(HashSeed::ZERO, Mixer::Portable);
        let b = SeededState::new(HashSeed::ZERO, Mixer::Aes);
        for k in ["", "x", "sixteen-byte-key", "a much longer key that spans words"] {
            assert_eq!(a.hash_one(k), b.hash_one(k));
        }
    }
}
