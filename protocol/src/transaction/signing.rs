//! Transaction signing.
//!
//! Signing is separate from building because the key may not be available
//! at construction time (hardware wallet, remote signer). Each call appends
//! one `(public key, signature)` pair; multi-owner spends call it once per
//! key. The first key to sign becomes the transaction's signer.

use super::builder::Transaction;
use super::types::TxSignature;
use crate::crypto::keys::KeyPair;

/// Sign `tx` with `keypair`, appending the pair to `tx.signatures`.
///
/// The signature covers [`Transaction::signable_bytes`], so signing does
/// not change the id and signatures may be added in any order.
pub fn sign_transaction<'a>(tx: &'a mut Transaction, keypair: &KeyPair) -> &'a Transaction {
    let signature = keypair.sign(&tx.signable_bytes());
    tx.signatures.push(TxSignature {
        public_key: keypair.public_key_bytes().to_vec(),
        signature,
    });
    tx
}
