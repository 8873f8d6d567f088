//! MurmurHash2 mixers used for keys no wider than a machine word.

const M32: u32 = 0x5bd1e995;
const R32: u32 = 24;

const M64: u64 = 0xc6a4a7935bd1e995;
const R64: u32 = 47;

/// MurmurHash2, 32-bit variant. Only the low 32 bits of `seed` are used.
pub fn murmur2_32(bytes: &[u8], seed: u64) -> u32 {
    let len = bytes.len();
    let mut h = (seed as u32) ^ (len as u32);

    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M32);
        k ^= k >> R32;
        k = k.wrapping_mul(M32);
        h = h.wrapping_mul(M32);
        h ^= k;
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        for (i, &b) in tail.iter().enumerate().rev() {
            h ^= (b as u32) << (8 * i);
        }
        h = h.wrapping_mul(M32);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M32);
    h ^= h >> 15;
    h
}

/// MurmurHash64A.
pub fn murmur64a(bytes: &[u8], seed: u64) -> u64 {
    let len = bytes.len();
    let mut h = seed ^ (len as u64).wrapping_mul(M64);

    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let mut k = u64::from_le_bytes(word);
        k = k.wrapping_mul(M64);
        k ^= k >> R64;
        k = k.wrapping_mul(M64);
        h ^= k;
        h = h.wrapping_mul(M64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        for (i, &b) in tail.iter().enumerate().rev() {
            h ^= (b as u64) << (8 * i);
        }
        h = h.wrapping_mul(M64);
    }

    h ^= h >> R64;
    h = h.wrapping_mul(M64);
    h ^= h >> R64;
    h
}

/// The word-sized variant for the current target.
#[inline]
pub fn murmur_word(bytes: &[u8], seed: u64) -> u64 {
    #[cfg(target_pointer_width = "64")]
    {
        murmur64a(bytes, seed)
    }
    #[cfg(not(target_pointer_width = "64"))]
    {
        murmur2_32(bytes, seed) as u64
    }
}
