// Hashing utilities

use sha2::{Sha256, Digest};
use crate::core::{Hash256, PubKeyHash};

/// Single SHA256 hash
pub fn sha256(data: &[u8]) -> Hash256 {
    let digest = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&digest);
    Hash256::new(result)
}

/// SHA256 of two concatenated parts, used for Merkle nodes
pub fn sha256_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    let mut result = [0u8; 32];
    result.copy_from_slice(&hasher.finalize());
    Hash256::new(result)
}

/// SHA256 double hash
/// hash256 = SHA256(SHA256(data))
pub fn hash256(data: &[u8]) -> Hash256 {
    let first_hash = Sha256::digest(data);
    let second_hash = Sha256::digest(first_hash);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second_hash);
    Hash256::new(result)
}

/// RIPEMD160(SHA256(data)) - public key hash used for addresses
pub fn hash160(data: &[u8]) -> PubKeyHash {
    use ripemd::{Ripemd160, Digest as RipemdDigest};
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut result = [0u8; 20];
    result.copy_from_slice(&ripemd);
    result
}
