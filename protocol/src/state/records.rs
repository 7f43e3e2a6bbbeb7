//! Ledger records: everything the state maps hold.
//!
//! All records are plain data with `serde` derives. They are stored with
//! bincode and hashed into the state digest, so field order is part of the
//! consensus format.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;
use crate::config::{ESCROW_ADDRESS_CONTEXT, POOL_ADDRESS_CONTEXT};
use crate::transaction::{OfferId, OutPoint, PoolId, TokenId, TokenType, TxOutput};

// ---------------------------------------------------------------------------
// Utxo
// ---------------------------------------------------------------------------

/// An output together with where and when it was created.
///
/// Spent outputs are kept with `is_spent = true` so a second spend reports
/// "already spent" rather than "not found". The flag only ever goes from
/// `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub out_point: OutPoint,
    pub output: TxOutput,
    pub block_height: u64,
    pub is_spent: bool,
}

impl Utxo {
    pub fn amount(&self) -> u64 {
        self.output.amount
    }

    pub fn owner(&self) -> &Address {
        &self.output.address
    }

    pub fn token_id(&self) -> &TokenId {
        &self.output.token_id
    }
}

// ---------------------------------------------------------------------------
// TokenInfo
// ---------------------------------------------------------------------------

/// Registry entry of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_id: TokenId,
    /// Stored upper-case.
    pub ticker: String,
    pub description: String,
    pub max_mint: u64,
    pub max_decimals: u8,
    /// `max_mint * 10^max_decimals` for custom tokens. For the base asset,
    /// the amount issued so far; for LP tokens, the current supply.
    pub total_supply: u64,
    /// Base asset still locked as mint collateral.
    pub locked_shadow: u64,
    /// Cumulative amount melted across all holders.
    pub total_melted: u64,
    pub creator: Address,
    /// `true` only for the base asset.
    pub is_shadow: bool,
    pub fully_melted: bool,
    pub kind: TokenType,
    pub created_at: u64,
}

impl TokenInfo {
    pub fn is_active(&self) -> bool {
        !self.fully_melted
    }

    /// Whether this token reserves its ticker. Pool shares never do: their
    /// tickers are derived from the pair and may repeat.
    pub fn holds_ticker(&self) -> bool {
        self.is_active() && self.kind != TokenType::Lp
    }

    /// Units not yet melted.
    pub fn unmelted(&self) -> u64 {
        self.total_supply.saturating_sub(self.total_melted)
    }

    /// Collateral released by melting `amount` more units:
    /// `floor(amount * locked_shadow / unmelted)`, in `u128`.
    /// The melt that leaves nothing unmelted releases the remainder.
    pub fn unlock_for(&self, amount: u64) -> u64 {
        let unmelted = self.unmelted();
        if unmelted == 0 || amount >= unmelted {
            return self.locked_shadow;
        }
        let released = u128::from(amount) * u128::from(self.locked_shadow) / u128::from(unmelted);
        u64::try_from(released).unwrap_or(self.locked_shadow)
    }
}

// ---------------------------------------------------------------------------
// SwapOffer
// ---------------------------------------------------------------------------

/// Lifecycle of a swap offer.
///
/// `Expired` is never stored. It is what [`SwapOffer::effective_state`]
/// reports for a stored `Active` offer whose expiry height has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferState {
    Active,
    Accepted,
    Cancelled,
    Expired,
}

impl fmt::Display for OfferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A peer-to-peer swap offer backed by an escrow output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOffer {
    pub offer_id: OfferId,
    pub creator: Address,
    pub have_token: TokenId,
    pub have_amount: u64,
    pub want_token: TokenId,
    pub want_amount: u64,
    pub expires_at_block: Option<u64>,
    pub state: OfferState,
    /// The output holding the escrowed `have_amount`.
    pub escrow: OutPoint,
    pub created_at: u64,
}

impl SwapOffer {
    /// Keyless exchange address that owns an offer's escrow output.
    pub fn escrow_address(offer_id: &OfferId) -> Address {
        Address::keyless(ESCROW_ADDRESS_CONTEXT, offer_id.as_bytes())
    }

    pub fn is_expired_at(&self, height: u64) -> bool {
        self.expires_at_block.is_some_and(|expiry| height >= expiry)
    }

    /// Stored state with expiry applied.
    pub fn effective_state(&self, height: u64) -> OfferState {
        match self.state {
            OfferState::Active if self.is_expired_at(height) => OfferState::Expired,
            state => state,
        }
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// A constant-product pool. Reserves are held by the ledger itself rather
/// than as outputs, so only pool operations can move them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub pool_id: PoolId,
    /// `token_a < token_b` always.
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub reserve_a: u64,
    pub reserve_b: u64,
    pub lp_token_id: TokenId,
    pub lp_supply: u64,
    pub fee_basis_points: u16,
    pub creator: Address,
    pub created_at: u64,
}

impl Pool {
    /// `reserve_a * reserve_b`.
    pub fn k(&self) -> u128 {
        u128::from(self.reserve_a) * u128::from(self.reserve_b)
    }

    /// Keyless liquidity address identifying the pool in encoded form.
    pub fn reserve_address(&self) -> Address {
        Address::keyless(POOL_ADDRESS_CONTEXT, self.pool_id.as_bytes())
    }

    /// Reserves ordered as `(in, out)` for a swap of `token_in`, or `None`
    /// if the token is not in the pool.
    pub fn reserves_for(&self, token_in: &TokenId) -> Option<(u64, u64)> {
        if *token_in == self.token_a {
            Some((self.reserve_a, self.reserve_b))
        } else if *token_in == self.token_b {
            Some((self.reserve_b, self.reserve_a))
        } else {
            None
        }
    }
}

/// Canonical order of an unordered token pair.
pub fn ordered_pair(a: TokenId, b: TokenId) -> (TokenId, TokenId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ---------------------------------------------------------------------------
// ValidatorRecord
// ---------------------------------------------------------------------------

/// A registered validator and its locked stake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub address: Address,
    pub public_key: Vec<u8>,
    pub stake: u64,
    pub registered_at: u64,
}
