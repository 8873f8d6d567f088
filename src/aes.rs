//! AES-round based mixer.
//!
//! The mixer needs only the single-round `aesenc` primitive (SubBytes,
//! ShiftRows, MixColumns, AddRoundKey). It comes from the `aes` crate's
//! `hazmat::cipher_round`, which uses AES-NI or the ARMv8 crypto extension
//! when the CPU has them and a constant-time bitsliced round otherwise.

use ::aes::hazmat::cipher_round;

pub type Block = [u8; 16];

/// One AES encryption round, with the semantics of x86 `aesenc`.
#[inline(always)]
pub fn aesenc(block: Block, key: Block) -> Block {
    let mut b = ::aes::Block::from(block);
    cipher_round(&mut b, &::aes::Block::from(key));
    b.into()
}

/// Whether the running CPU executes the AES round in hardware.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn hardware_available() -> bool {
    std::arch::is_x86_feature_detected!("aes")
}

#[cfg(target_arch = "aarch64")]
pub fn hardware_available() -> bool {
    std::arch::is_aarch64_feature_detected!("aes")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
pub fn hardware_available() -> bool {
    false
}

#[inline(always)]
fn block_from(lo: u64, hi: u64) -> Block {
    let mut b = [0u8; 16];
    b[..8].copy_from_slice(&lo.to_le_bytes());
    b[8..].copy_from_slice(&hi.to_le_bytes());
    b
}

#[inline(always)]
fn xor(a: Block, b: &[u8]) -> Block {
    let mut out = a;
    for (o, x) in out.iter_mut().zip(b) {
        *o ^= x;
    }
    out
}

#[inline(always)]
fn mix16(state: Block, data: &[u8]) -> Block {
    let s = xor(state, data);
    let s = aesenc(s, s);
    aesenc(s, s)
}

/// Hashes `bytes` on two 16-byte lanes (32 bytes per step).
///
/// `seed2` is the secondary seed; the byte length is folded into the second
/// lane so inputs that differ only by trailing zero padding do not collide.
pub fn aes_hash(bytes: &[u8], seed: u64, seed2: u64) -> u64 {
    let len = bytes.len() as u64;
    let mut s0 = block_from(seed, seed2);
    let mut s1 = aesenc(block_from(seed2 ^ len, seed.rotate_left(32) ^ len), s0);

    let mut chunks = bytes.chunks_exact(32);
    for chunk in &mut chunks {
        s0 = mix16(s0, &chunk[..16]);
        s1 = mix16(s1, &chunk[16..]);
    }

    let rem = chunks.remainder();
    if rem.len() > 16 {
        s0 = mix16(s0, &rem[..16]);
        s1 = mix16(s1, &bytes[bytes.len() - 16..]);
    } else if !rem.is_empty() {
        if bytes.len() >= 16 {
            // Overlap with already consumed bytes instead of padding.
            s0 = mix16(s0, &bytes[bytes.len() - 16..]);
        } else {
            let mut padded = [0u8; 16];
            padded[..rem.len()].copy_from_slice(rem);
            s0 = mix16(s0, &padded);
        }
    }

    let out = aesenc(xor(s0, &s1), s0);
    let mut lo = [0u8; 8];
    lo.copy_from_slice(&out[..8]);
    u64::from_le_bytes(lo)
}
