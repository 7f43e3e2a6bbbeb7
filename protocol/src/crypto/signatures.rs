//! # Digital Signatures
//!
//! The ledger treats signing as an opaque capability: it hands a scheme the
//! canonical transaction bytes, an embedded public key, and a signature, and
//! gets back yes or no. Everything scheme-specific stays behind
//! [`SignatureScheme`], so swapping the primitive (for example to a lattice
//! signature) is a matter of passing a different implementation into
//! [`Ledger::open`](crate::ledger::Ledger::open).
//!
//! [`Ed25519Scheme`] is the default implementation and the one [`KeyPair`]
//! produces signatures for.
//!
//! [`KeyPair`]: super::KeyPair

use ed25519_dalek::{Signature as DalekSignature, VerifyingKey};

/// A verify-only view of a signature algorithm.
///
/// Implementations must be deterministic and side-effect free: replaying a
/// block on another node must reach the same verdict for every signature.
/// Malformed keys or signatures are simply `false`, never a panic.
pub trait SignatureScheme: Send + Sync {
    /// Short algorithm name for logs and status output.
    fn name(&self) -> &'static str;

    /// Returns `true` iff `signature` is valid for `message` under `public_key`.
    fn verify(&self, message: &[u8], public_key: &[u8], signature: &[u8]) -> bool;
}

/// Ed25519 with strict verification.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Scheme;

impl SignatureScheme for Ed25519Scheme {
    fn name(&self) -> &'static str {
        "ed25519"
    }

    fn verify(&self, message: &[u8], public_key: &[u8], signature: &[u8]) -> bool {
        verify_ed25519(public_key, message, signature)
    }
}

/// Verify raw Ed25519 bytes. Wrong lengths and invalid points yield `false`.
pub fn verify_ed25519(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(pk_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_bytes) else {
        return false;
    };
    let sig = DalekSignature::from_bytes(&sig_bytes);
    verifying_key.verify_strict(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn scheme_accepts_keypair_signatures() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"hello");
        assert!(Ed25519Scheme.verify(b"hello", &kp.public_key_bytes(), &sig));
    }

    #[test]
    fn scheme_rejects_tampered_message() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"hello");
        assert!(!Ed25519Scheme.verify(b"hellO", &kp.public_key_bytes(), &sig));
    }

    #[test]
    fn malformed_inputs_are_false_not_panics() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"x");
        assert!(!Ed25519Scheme.verify(b"x", &[0u8; 16], &sig));
        assert!(!Ed25519Scheme.verify(b"x", &kp.public_key_bytes(), &sig[..32]));
        assert!(!Ed25519Scheme.verify(b"x", &[], &[]));
    }

    #[test]
    fn scheme_is_object_safe() {
        let scheme: Box<dyn SignatureScheme> = Box::new(Ed25519Scheme);
        assert_eq!(scheme.name(), "ed25519");
    }
}
