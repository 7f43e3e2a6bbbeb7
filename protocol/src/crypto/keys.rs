//! # Key Management
//!
//! Ed25519 key pairs for ledger participants.
//!
//! The ledger itself never signs anything and only verifies through the
//! [`SignatureScheme`](super::SignatureScheme) it was constructed with. This
//! module is what wallets, the node binary, and tests use to produce keys
//! and signatures that the default scheme accepts.
//!
//! Key bytes are never logged. `Debug` prints the public half only.

use ed25519_dalek::{Signer, SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

use crate::address::{derive, Address};

/// Errors that can occur while loading key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: expected {SECRET_KEY_LENGTH} bytes of hex")]
    InvalidSecretKey,

    #[error("invalid public key bytes")]
    InvalidPublicKey,
}

/// An Ed25519 signing key plus convenience accessors.
///
/// Deliberately not `Serialize`: exporting a secret should be an explicit
/// call to [`KeyPair::secret_key_bytes`], never a side effect of logging or
/// JSON encoding.
///
/// # Examples
///
/// ```
/// use shadow_protocol::crypto::KeyPair;
///
/// let kp = KeyPair::generate();
/// let sig = kp.sign(b"send 100 SHADOW");
/// assert!(kp.verify(b"send 100 SHADOW", &sig));
/// ```
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic key pair from a 32-byte seed. Tests and genesis
    /// tooling rely on this; wallets should prefer [`KeyPair::generate`].
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load a key pair from a hex-encoded 32-byte secret.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Raw public key bytes. This is what gets embedded in transactions.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Hex form of the public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// The ledger address owned by this key.
    pub fn address(&self) -> Address {
        derive(&self.public_key_bytes())
    }

    /// Sign `message`, returning the 64 raw signature bytes.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    /// Verify `signature` over `message` against this key's public half.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        super::verify_ed25519(&self.public_key_bytes(), message, signature)
    }

    /// Export the 32-byte secret. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair(pub={})", self.public_key_hex())
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key_bytes() == other.public_key_bytes()
    }
}

impl Eq for KeyPair {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_sign_verify_roundtrip() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"transfer 100");
        assert_eq!(sig.len(), 64);
        assert!(kp.verify(b"transfer 100", &sig));
        assert!(!kp.verify(b"transfer 101", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.verify(b"message", &sig));
    }

    #[test]
    fn deterministic_from_seed() {
        let a = KeyPair::from_seed(&[42u8; 32]);
        let b = KeyPair::from_seed(&[42u8; 32]);
        assert_eq!(a, b);
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_roundtrip_hex() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_hex(&hex::encode(kp.secret_key_bytes())).unwrap();
        assert_eq!(kp.public_key_bytes(), restored.public_key_bytes());
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(KeyPair::from_hex("deadbeef").is_err());
        assert!(KeyPair::from_hex("not-hex-at-all").is_err());
    }

    #[test]
    fn address_is_blake3_of_public_key() {
        let kp = KeyPair::from_seed(&[7u8; 32]);
        assert_eq!(
            kp.address().as_bytes(),
            &crate::crypto::blake3_hash(&kp.public_key_bytes())
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = KeyPair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("KeyPair(pub="));
        assert!(!debug_str.contains(&hex::encode(kp.secret_key_bytes())));
    }
}
