//! # Cryptographic Primitives
//!
//! Hashes, the Ed25519 key pair used by wallets and tests, and the
//! [`SignatureScheme`] seam through which the ledger verifies signatures.
//!
//! Everything here wraps audited crates (`blake3`, `sha2`, `sha3`,
//! `ed25519-dalek`). Nothing is hand-rolled.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{
    blake3_hash, blake3_hash_multi, domain_separated_hash, double_sha256, keccak256, merkle_root,
    sha256,
};
pub use keys::{KeyError, KeyPair};
pub use signatures::{verify_ed25519, Ed25519Scheme, SignatureScheme};
