//! Typed parameters carried in a transaction's `data` field.
//!
//! Each engine-driven transaction type has one parameter struct, encoded
//! with bincode. The structs validate their own stateless rules (charsets,
//! ranges, non-zero amounts); anything that needs ledger state is checked by
//! the engine that executes them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::types::{OfferId, PoolId, TokenId, TxType};
use super::ValidationError;
use crate::config::{
    MAX_DECIMALS, MAX_DESCRIPTION_LENGTH, MAX_MINT, MAX_POOL_FEE_BPS, MAX_TICKER_LENGTH,
    MIN_POOL_FEE_BPS, MIN_TICKER_LENGTH, NATIVE_TICKER,
};

/// Binds a parameter struct to the transaction type that carries it.
pub trait TxParams: Serialize + DeserializeOwned {
    const TX_TYPE: TxType;

    /// Stateless checks. The default accepts everything.
    fn check(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// `MintToken`: registers a custom token and mints its full supply to the
/// transaction outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    pub ticker: String,
    pub description: String,
    /// Whole units; total supply is `max_mint * 10^max_decimals`.
    pub max_mint: u64,
    pub max_decimals: u8,
}

impl MintParams {
    /// `max_mint * 10^max_decimals`, or `None` on overflow.
    pub fn total_supply(&self) -> Option<u64> {
        10u64
            .checked_pow(u32::from(self.max_decimals))
            .and_then(|scale| self.max_mint.checked_mul(scale))
    }
}

impl TxParams for MintParams {
    const TX_TYPE: TxType = TxType::MintToken;

    fn check(&self) -> Result<(), ValidationError> {
        check_ticker(&self.ticker)?;
        if self.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(ValidationError::DescriptionTooLong(self.description.len()));
        }
        if !self.description.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Err(ValidationError::InvalidDescription);
        }
        if self.max_mint == 0 || self.max_mint > MAX_MINT {
            return Err(ValidationError::MaxMintOutOfRange(self.max_mint));
        }
        if self.max_decimals > MAX_DECIMALS {
            return Err(ValidationError::DecimalsOutOfRange(self.max_decimals));
        }
        Ok(())
    }
}

/// Ticker rules shared by mint validation and the registry.
pub fn check_ticker(ticker: &str) -> Result<(), ValidationError> {
    let len = ticker.len();
    let valid = (MIN_TICKER_LENGTH..=MAX_TICKER_LENGTH).contains(&len)
        && ticker.bytes().all(|b| b.is_ascii_alphanumeric())
        && !ticker.eq_ignore_ascii_case(NATIVE_TICKER);
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidTicker(ticker.to_string()))
    }
}

/// `Melt`: destroys custom tokens named by the transaction's `token_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltParams {
    /// Amount to melt; `0` melts all token value in the inputs.
    pub amount: u64,
}

impl TxParams for MeltParams {
    const TX_TYPE: TxType = TxType::Melt;
}

/// `Offer`: escrow `have` in exchange for `want`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferParams {
    pub have_token: TokenId,
    pub have_amount: u64,
    pub want_token: TokenId,
    pub want_amount: u64,
    pub expires_at_block: Option<u64>,
}

impl TxParams for OfferParams {
    const TX_TYPE: TxType = TxType::Offer;

    fn check(&self) -> Result<(), ValidationError> {
        if self.have_amount == 0 || self.want_amount == 0 {
            return Err(ValidationError::ZeroParameter("offer amount"));
        }
        if self.have_token == self.want_token {
            return Err(ValidationError::IdenticalTokens);
        }
        Ok(())
    }
}

/// `AcceptOffer`: names the offer being taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptOfferParams {
    pub offer_id: OfferId,
}

impl TxParams for AcceptOfferParams {
    const TX_TYPE: TxType = TxType::AcceptOffer;
}

/// `CancelOffer`: names the offer being withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOfferParams {
    pub offer_id: OfferId,
}

impl TxParams for CancelOfferParams {
    const TX_TYPE: TxType = TxType::CancelOffer;
}

/// `CreatePool`: seed a constant-product pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoolParams {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub amount_a: u64,
    pub amount_b: u64,
    pub fee_basis_points: u16,
}

impl TxParams for CreatePoolParams {
    const TX_TYPE: TxType = TxType::CreatePool;

    fn check(&self) -> Result<(), ValidationError> {
        if self.token_a == self.token_b {
            return Err(ValidationError::IdenticalTokens);
        }
        if self.amount_a == 0 || self.amount_b == 0 {
            return Err(ValidationError::ZeroParameter("pool deposit"));
        }
        if !(MIN_POOL_FEE_BPS..=MAX_POOL_FEE_BPS).contains(&self.fee_basis_points) {
            return Err(ValidationError::PoolFeeOutOfRange(self.fee_basis_points));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityParams {
    pub pool_id: PoolId,
    pub amount_a: u64,
    pub amount_b: u64,
    pub min_lp_out: u64,
}

impl TxParams for AddLiquidityParams {
    const TX_TYPE: TxType = TxType::AddLiquidity;

    fn check(&self) -> Result<(), ValidationError> {
        if self.amount_a == 0 || self.amount_b == 0 {
            return Err(ValidationError::ZeroParameter("liquidity deposit"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityParams {
    pub pool_id: PoolId,
    pub lp_amount: u64,
    pub min_amount_a: u64,
    pub min_amount_b: u64,
}

impl TxParams for RemoveLiquidityParams {
    const TX_TYPE: TxType = TxType::RemoveLiquidity;

    fn check(&self) -> Result<(), ValidationError> {
        if self.lp_amount == 0 {
            return Err(ValidationError::ZeroParameter("lp amount"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    pub pool_id: PoolId,
    pub token_in: TokenId,
    pub amount_in: u64,
    pub min_amount_out: u64,
}

impl TxParams for SwapParams {
    const TX_TYPE: TxType = TxType::Swap;

    fn check(&self) -> Result<(), ValidationError> {
        if self.amount_in == 0 {
            return Err(ValidationError::ZeroParameter("swap amount"));
        }
        Ok(())
    }
}

/// Encode parameters for the `data` field.
pub fn encode<P: TxParams>(params: &P) -> Result<Vec<u8>, ValidationError> {
    bincode::serialize(params).map_err(|e| ValidationError::MalformedData(e.to_string()))
}

/// Decode parameters from the `data` field.
pub fn decode<P: TxParams>(data: Option<&[u8]>) -> Result<P, ValidationError> {
    let bytes = data.ok_or_else(|| ValidationError::MalformedData("missing data".into()))?;
    bincode::deserialize(bytes).map_err(|e| ValidationError::MalformedData(e.to_string()))
}
