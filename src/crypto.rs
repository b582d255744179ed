use crate::types::{DrawIndex, Hash};
use primitive_types::U256;
use sha3::{Digest, Keccak256, Sha3_256};

fn sha3_concat(a: &[u8], b: &[u8]) -> Hash {
    let mut hasher = Sha3_256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

/// Keccak-256 of the 32-byte big-endian encoding of `value`
pub fn keccak_u256(value: U256) -> U256 {
    U256::from_big_endian(&keccak256(&u256_to_bytes(value)))
}

pub fn u256_to_bytes(value: U256) -> Hash {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

pub fn u256_from_bytes(bytes: &Hash) -> U256 {
    U256::from_big_endian(bytes)
}

/// Entropy for a draw, fixed before anyone can see the draw's deposits
///
/// ```text
/// seed = SHA3-256(prev_hash ‖ draw_index)
/// ```
pub fn draw_seed(prev_hash: &Hash, draw_index: DrawIndex) -> U256 {
    let hash = sha3_concat(prev_hash, &draw_index.to_le_bytes());
    u256_from_bytes(&hash)
}
