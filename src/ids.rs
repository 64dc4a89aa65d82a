//! Identifier space: `W`-bit node/key identifiers, ring distance, XOR distance.
//!
//! `W` is a configuration parameter (spec.md §3). Real SHA-256 digests are
//! 256 bits wide; this implementation keeps only the low `bits` bits of the
//! digest in a `u64`, which caps the practical world size at 64 (see
//! SPEC_FULL.md Open Question OQ-1). Every scenario in spec.md §8 fits
//! comfortably inside that width.

use sha2::{Digest, Sha256};
use std::fmt;

/// A node or key identifier: the low `bits` bits of a SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct Id(pub u64);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Bit mask selecting the low `bits` bits of a `u64`. `bits >= 64` yields the
/// all-ones mask (the full word).
pub fn mask_for(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Hashes `name` (or, for Chord's per-identity ids, `"{name}_{index}"`) down
/// to `bits` bits. Mirrors `Node._compute_key` in the original Python source:
/// the base identity hashes the bare name, per-index identities hash
/// `name‖"_"‖index`.
pub fn hash_identity(name: &str, index: Option<usize>, bits: u32) -> Id {
    let input = match index {
        None => name.to_string(),
        Some(i) => format!("{name}_{i}"),
    };
    let digest = Sha256::digest(input.as_bytes());
    let mut be_bytes = [0u8; 8];
    be_bytes.copy_from_slice(&digest[0..8]);
    let word = u64::from_be_bytes(be_bytes);
    Id(word & mask_for(bits))
}

/// Hashes an arbitrary key string into the identifier space (spec.md §3,
/// "Key identity is derived analogously from the key string").
pub fn hash_key(key: &str, bits: u32) -> Id {
    hash_identity(key, None, bits)
}

/// Chord ring distance: `(b - a) mod 2^bits`. Asymmetric, forward-going.
pub fn ring_distance(a: Id, b: Id, bits: u32) -> u64 {
    let mask = mask_for(bits);
    b.0.wrapping_sub(a.0) & mask
}

/// Is `x` strictly between `a` and `b` going clockwise from `a` to `b`
/// (exclusive of both endpoints unless `a == b`, in which case every other
/// id is "between")?
pub fn ring_between(a: Id, x: Id, b: Id, bits: u32) -> bool {
    if a == b {
        x != a
    } else {
        ring_distance(a, x, bits) < ring_distance(a, b, bits) && x != a
    }
}

/// Kademlia XOR distance.
pub fn xor_distance(a: Id, b: Id) -> u64 {
    a.0 ^ b.0
}

/// `floor(log2(d))`, with `d == 0` mapped to bucket `0` per spec.md §3/§4.6.
pub fn bucket_index(d: u64) -> usize {
    if d == 0 {
        0
    } else {
        63 - d.leading_zeros() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_identity_is_deterministic() {
        let a = hash_identity("node-a", None, 32);
        let b = hash_identity("node-a", None, 32);
        assert_eq!(a, b);
    }

    #[test]
    fn per_index_identities_diverge() {
        let a = hash_identity("node-a", Some(0), 32);
        let b = hash_identity("node-a", Some(1), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn ring_distance_wraps() {
        // With a 4-bit space, distance from 15 to 1 going clockwise is 2.
        assert_eq!(ring_distance(Id(15), Id(1), 4), 2);
        assert_eq!(ring_distance(Id(1), Id(15), 4), 14);
    }

    #[test]
    fn bucket_index_floor_log2() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(1), 0);
        assert_eq!(bucket_index(2), 1);
        assert_eq!(bucket_index(3), 1);
        assert_eq!(bucket_index(4), 2);
        assert_eq!(bucket_index(1023), 9);
    }

    #[test]
    fn ring_between_handles_self_successor() {
        assert!(ring_between(Id(5), Id(5), Id(5), 8) == false);
        assert!(ring_between(Id(1), Id(3), Id(10), 8));
        assert!(!ring_between(Id(1), Id(20), Id(10), 8));
    }
}
