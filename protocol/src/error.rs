//! The ledger's error taxonomy.
//!
//! Every rejection is a typed value returned to the caller: a `check_tx`
//! rejection, or a per-transaction failure that excludes just that
//! transaction from a block. Only [`LedgerError::Storage`] and
//! [`LedgerError::Halted`] concern the ledger as a whole.

use thiserror::Error;

use crate::address::{Address, AddressError};
use crate::mempool::MempoolError;
use crate::storage::StoreError;
use crate::transaction::{OfferId, OutPoint, PoolId, TokenId, TxId, ValidationError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("address format: {0}")]
    AddressFormat(#[from] AddressError),

    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("utxo {0} not found")]
    UtxoNotFound(OutPoint),

    #[error("utxo {0} already spent")]
    UtxoAlreadySpent(OutPoint),

    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u128, need: u128 },

    #[error("token {token} does not balance: {inputs} in, {outputs} out")]
    UnbalancedToken {
        token: TokenId,
        inputs: u128,
        outputs: u128,
    },

    #[error("ticker '{0}' is held by an active token")]
    TickerInUse(String),

    #[error("token {0} not found")]
    TokenNotFound(TokenId),

    #[error("the base asset cannot be melted")]
    CannotMeltBaseToken,

    #[error("token {0} cannot be used in this operation")]
    UnsupportedToken(TokenId),

    #[error("insufficient token balance: have {have}, need {need}")]
    InsufficientTokenBalance { have: u64, need: u64 },

    #[error("insufficient stake: have {have}, need {need}")]
    InsufficientStake { have: u64, need: u64 },

    #[error("offer {0} not found")]
    OfferNotFound(OfferId),

    #[error("offer {0} is not active")]
    OfferNotActive(OfferId),

    #[error("caller does not own offer {0}")]
    NotOfferOwner(OfferId),

    #[error("a pool for {0}/{1} already exists")]
    PoolAlreadyExists(TokenId, TokenId),

    #[error("pool {0} not found")]
    PoolNotFound(PoolId),

    #[error("deposit ratio deviates from the pool ratio by more than 1%")]
    RatioMismatch,

    #[error("slippage exceeded: would receive {actual}, minimum {minimum}")]
    SlippageExceeded { actual: u64, minimum: u64 },

    #[error("pool has insufficient liquidity")]
    InsufficientLiquidity,

    #[error("validator {0:?} is already registered")]
    ValidatorAlreadyRegistered(Address),

    #[error("transaction {0} has already been applied")]
    DuplicateTransaction(TxId),

    #[error("a block may contain at most one coinbase")]
    DuplicateCoinbase,

    #[error("coinbase creates {amount}, block reward is {limit}")]
    CoinbaseTooLarge { amount: u128, limit: u64 },

    #[error("block already holds the maximum of {limit} transactions")]
    BlockFull { limit: usize },

    #[error("store holds no ledger; run genesis first")]
    NotInitialized,

    #[error("store already holds a ledger")]
    AlreadyInitialized,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("mempool: {0}")]
    Mempool(#[from] MempoolError),

    #[error("storage: {0}")]
    Storage(#[from] StoreError),

    #[error("ledger halted after a storage failure; restart required")]
    Halted,
}

impl LedgerError {
    /// Errors that make the committed state untrustworthy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Halted)
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
