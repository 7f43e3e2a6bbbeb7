//! Core type definitions for ledger transactions.
//!
//! These types form the vocabulary of every transaction: what kind of
//! operation it is, which outputs it spends, and which outputs it creates.
//! Identifiers are fixed-size newtypes so a token id can never be passed
//! where a transaction id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::address::Address;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..16])
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s.trim(), &mut bytes)?;
                Ok(Self(bytes))
            }
        }
    };
}

hash_id!(
    /// Transaction id: `double_sha256(signable_bytes)`. Offers and pools are
    /// identified by the id of the transaction that created them.
    TxId
);

hash_id!(
    /// Token id: the id of the minting (or pool-creating) transaction.
    /// [`TokenId::NATIVE`] denotes the base asset.
    TokenId
);

impl TokenId {
    /// The base asset. No transaction can hash to all zeros.
    pub const NATIVE: TokenId = TokenId([0u8; 32]);

    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }
}

impl From<TxId> for TokenId {
    fn from(id: TxId) -> Self {
        TokenId(id.0)
    }
}

/// A pool is identified by its creating transaction, and its LP token
/// shares those bytes.
pub type PoolId = TxId;

/// An offer is identified by its creating transaction.
pub type OfferId = TxId;

/// Reference to one output of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: TxId,
    pub index: u32,
}

impl OutPoint {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

// ---------------------------------------------------------------------------
// TxType
// ---------------------------------------------------------------------------

/// Discriminant for the operation a transaction represents.
///
/// Declaration order is the wire order: the numeric code of each variant is
/// its position, and both bincode and the signable encoding depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    Coinbase,
    Send,
    MintToken,
    Melt,
    RegisterValidator,
    Offer,
    AcceptOffer,
    CancelOffer,
    CreatePool,
    AddLiquidity,
    RemoveLiquidity,
    Swap,
}

impl TxType {
    pub const ALL: [TxType; 12] = [
        TxType::Coinbase,
        TxType::Send,
        TxType::MintToken,
        TxType::Melt,
        TxType::RegisterValidator,
        TxType::Offer,
        TxType::AcceptOffer,
        TxType::CancelOffer,
        TxType::CreatePool,
        TxType::AddLiquidity,
        TxType::RemoveLiquidity,
        TxType::Swap,
    ];

    /// Wire code, 0 through 11.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Creation types spend nothing: value comes from the block reward or
    /// (for mints) from inputs the engine selects itself.
    pub fn is_creation(self) -> bool {
        matches!(self, Self::Coinbase | Self::MintToken)
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// TokenType
// ---------------------------------------------------------------------------

/// Which family of asset an output carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    Native,
    Custom,
    Lp,
}

impl TokenType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Native => "native",
            Self::Custom => "custom",
            Self::Lp => "lp",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Inputs, outputs, signatures
// ---------------------------------------------------------------------------

/// Spends one prior output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_tx_id: TxId,
    pub output_index: u32,
    /// Opaque signer material. Carried and hashed, never interpreted.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    pub fn new(out_point: OutPoint) -> Self {
        Self {
            prev_tx_id: out_point.tx_id,
            output_index: out_point.index,
            script_sig: Vec::new(),
            sequence: u32::MAX,
        }
    }

    pub fn out_point(&self) -> OutPoint {
        OutPoint::new(self.prev_tx_id, self.output_index)
    }
}

/// Creates one new spendable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Smallest-unit amount. Always > 0.
    pub amount: u64,
    pub address: Address,
    pub token_id: TokenId,
    pub token_type: TokenType,
    /// Opaque locking data. Carried and hashed, never interpreted.
    pub script_pub_key: Vec<u8>,
}

impl TxOutput {
    /// A native-asset output.
    pub fn native(amount: u64, address: Address) -> Self {
        Self::token(amount, address, TokenId::NATIVE, TokenType::Native)
    }

    pub fn token(amount: u64, address: Address, token_id: TokenId, token_type: TokenType) -> Self {
        Self {
            amount,
            address,
            token_id,
            token_type,
            script_pub_key: Vec::new(),
        }
    }
}

/// One embedded `(public key, signature)` pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pk = hex::encode(&self.public_key);
        write!(f, "TxSignature(pk={}..)", &pk[..pk.len().min(16)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_match_wire_table() {
        assert_eq!(TxType::Coinbase.code(), 0);
        assert_eq!(TxType::RegisterValidator.code(), 4);
        assert_eq!(TxType::CancelOffer.code(), 7);
        assert_eq!(TxType::Swap.code(), 11);
        for t in TxType::ALL {
            assert_eq!(TxType::from_code(t.code()), Some(t));
        }
        assert_eq!(TxType::from_code(12), None);
    }

    #[test]
    fn outpoints_order_by_tx_then_index() {
        let a = OutPoint::new(TxId([1; 32]), 5);
        let b = OutPoint::new(TxId([1; 32]), 6);
        let c = OutPoint::new(TxId([2; 32]), 0);
        assert!(a < b && b < c);
    }

    #[test]
    fn ids_roundtrip_through_hex() {
        let id = TxId([0xab; 32]);
        assert_eq!(id.to_string().parse::<TxId>().unwrap(), id);
        assert!("zz".parse::<TokenId>().is_err());
    }

    #[test]
    fn native_token_is_zero() {
        assert!(TokenId::NATIVE.is_native());
        assert!(!TokenId::from(TxId([1; 32])).is_native());
    }
}
