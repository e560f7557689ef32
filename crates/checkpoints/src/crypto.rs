//! Domain-separated hashing for checkpoint trees

use alloy_primitives::U256;

use crate::Hash32;

const DOMAIN_LEAF: u8 = 0x00;
const DOMAIN_INTERNAL: u8 = 0x01;
const DOMAIN_EMPTY: u8 = 0x02;

/// Hash arbitrary payload bytes into a commitment
pub fn hash_value(value: &[u8]) -> Hash32 {
    blake3::hash(value).into()
}

/// Commitment for a numeric value: its 32-byte big-endian encoding
pub fn commitment_for(number: U256) -> Hash32 {
    number.to_be_bytes::<32>()
}

/// Leaf hash of an occupied key
/// leaf = H(0x00 || commitment)
pub fn hash_leaf(commitment: Hash32) -> Hash32 {
    let mut data = [0u8; 1 + 32];
    data[0] = DOMAIN_LEAF;
    data[1..].copy_from_slice(&commitment);
    blake3::hash(&data).into()
}

/// Internal node hash
/// node = H(0x01 || left || right)
pub fn hash_internal(left: Hash32, right: Hash32) -> Hash32 {
    let mut data = [0u8; 1 + 32 + 32];
    data[0] = DOMAIN_INTERNAL;
    data[1..33].copy_from_slice(&left);
    data[33..].copy_from_slice(&right);
    blake3::hash(&data).into()
}

/// Canonical "empty leaf hash" (proves non-existence).
///
/// Lives in its own domain, so no commitment (not even the zero hash)
/// produces a leaf equal to it.
pub fn empty_leaf_hash() -> Hash32 {
    blake3::hash(&[DOMAIN_EMPTY]).into()
}

/// Canonical zero hash, reported by blocks that have not been built
pub const fn zero_hash() -> Hash32 {
    [0u8; 32]
}
