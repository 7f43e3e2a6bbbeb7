//! Key layout.
//!
//! | Prefix / key | Key suffix                | Value                     |
//! |--------------|---------------------------|---------------------------|
//! | `u/`         | tx id (32B) + index (4B BE)| `bincode(Utxo)`          |
//! | `t/`         | token id (32B)            | `bincode(TokenInfo)`      |
//! | `o/`         | offer id (32B)            | `bincode(SwapOffer)`      |
//! | `p/`         | pool id (32B)             | `bincode(Pool)`           |
//! | `v/`         | address (32B)             | `bincode(ValidatorRecord)`|
//! | `m/height`   |                           | height (8B BE)            |
//! | `m/fees`     |                           | `bincode(u128)`           |
//! | `m/digest`   |                           | digest (32B)              |
//!
//! Output indexes are big-endian so byte order matches outpoint order.

use crate::address::Address;
use crate::transaction::{OutPoint, TokenId, TxId};

pub const UTXO_PREFIX: &[u8] = b"u/";
pub const TOKEN_PREFIX: &[u8] = b"t/";
pub const OFFER_PREFIX: &[u8] = b"o/";
pub const POOL_PREFIX: &[u8] = b"p/";
pub const VALIDATOR_PREFIX: &[u8] = b"v/";

pub const META_HEIGHT: &[u8] = b"m/height";
pub const META_FEES: &[u8] = b"m/fees";
pub const META_DIGEST: &[u8] = b"m/digest";

fn prefixed(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

pub fn utxo(out_point: &OutPoint) -> Vec<u8> {
    let mut key = prefixed(UTXO_PREFIX, out_point.tx_id.as_bytes());
    key.extend_from_slice(&out_point.index.to_be_bytes());
    key
}

pub fn token(token_id: &TokenId) -> Vec<u8> {
    prefixed(TOKEN_PREFIX, token_id.as_bytes())
}

pub fn offer(offer_id: &TxId) -> Vec<u8> {
    prefixed(OFFER_PREFIX, offer_id.as_bytes())
}

pub fn pool(pool_id: &TxId) -> Vec<u8> {
    prefixed(POOL_PREFIX, pool_id.as_bytes())
}

pub fn validator(address: &Address) -> Vec<u8> {
    prefixed(VALIDATOR_PREFIX, address.as_bytes())
}

/// Exclusive upper bound of every key under `prefix`.
pub fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return end;
        }
    }
    // All 0xFF: no finite bound; scan to the end of the keyspace.
    vec![u8::MAX; prefix.len() + 1]
}
