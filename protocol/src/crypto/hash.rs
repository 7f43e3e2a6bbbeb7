//! # Hashing Utilities
//!
//! Three hash functions, each with one job:
//!
//! - **BLAKE3** derives addresses, builds Merkle trees, and produces the
//!   state digest. It is the default for anything ledger-native.
//! - **SHA-256** (doubled) identifies transactions, so ids look and behave
//!   like the txids every UTXO tool already understands.
//! - **Keccak-256** is used only for the mixed-case address checksum, which
//!   follows the EIP-55 convention and therefore the Keccak digest it is
//!   defined over.

use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))`. Used for transaction ids.
///
/// # Example
///
/// ```
/// use shadow_protocol::crypto::double_sha256;
///
/// let tx_id = double_sha256(b"raw transaction bytes");
/// assert_eq!(tx_id.len(), 32);
/// ```
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// BLAKE3 of `data`.
///
/// # Example
///
/// ```
/// use shadow_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"shadow");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Keccak-256 (the pre-standard SHA-3 padding, as used by EIP-55).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Domain-separated BLAKE3 using the `derive_key` mode.
///
/// `domain_separated_hash("a", x)` and `domain_separated_hash("b", x)` never
/// collide, because the context selects a different internal IV.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash several byte slices as if they were concatenated.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Binary BLAKE3 Merkle root.
///
/// An odd trailing node is paired with itself; a single leaf is hashed with
/// itself so the root is never a raw leaf. The empty tree is all zeros.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level: Vec<[u8; 32]> = leaves.to_vec();

    if level.len() == 1 {
        return blake3_hash_multi(&[level[0].as_slice(), level[0].as_slice()]);
    }

    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(blake3_hash_multi(&[left.as_slice(), right.as_slice()]));
        }
        level = next;
    }

    level[0]
}
