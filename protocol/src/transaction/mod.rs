//! # Transaction Module
//!
//! Construction, canonical hashing, signing, and stateless validation of
//! ledger transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs      — identifiers, TxType codes, inputs/outputs/signatures
//! params.rs     — typed parameters carried in `data` for engine-driven types
//! builder.rs    — Transaction, its canonical bytes, and TransactionBuilder
//! signing.rs    — append (public key, signature) pairs
//! validation.rs — structural, signature, ownership, and timing checks
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build** with [`TransactionBuilder`].
//! 2. **Sign** with [`sign_transaction`], once per owning key.
//! 3. **Submit** raw bytes to `Ledger::check_tx` for mempool admission.
//! 4. **Apply** in block order through `block::apply_block`.
//!
//! ## Design Decisions
//!
//! - Ids are `double_sha256` of the canonical encoding without signatures,
//!   so an id is final before signing and cannot be malleated by re-signing.
//! - Amounts are `u64` in the smallest unit. No floating point.
//! - Fees are implicit: whatever native value the inputs carry beyond the
//!   outputs (and engine debits) is the fee.
//! - Validation here never touches state. Checks that need UTXOs or the
//!   registry receive already-resolved values.

pub mod builder;
pub mod params;
pub mod signing;
pub mod types;
pub mod validation;

use thiserror::Error;

pub use builder::{Transaction, TransactionBuilder};
pub use params::{
    AcceptOfferParams, AddLiquidityParams, CancelOfferParams, CreatePoolParams, MeltParams,
    MintParams, OfferParams, RemoveLiquidityParams, SwapParams, TxParams,
};
pub use signing::sign_transaction;
pub use types::{
    OfferId, OutPoint, PoolId, TokenId, TokenType, TxId, TxInput, TxOutput, TxSignature, TxType,
};
pub use validation::{
    validate, validate_input_owner, validate_lock_time, validate_signatures, validate_structure,
    validate_timestamp,
};

/// A structural or cryptographic defect in a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported transaction version {0}")]
    UnsupportedVersion(u16),

    #[error("{0} transactions must not have inputs")]
    UnexpectedInputs(TxType),

    #[error("{0} transactions require at least one input")]
    MissingInputs(TxType),

    #[error("{0} transactions require at least one output")]
    MissingOutputs(TxType),

    #[error("too many inputs: {0}")]
    TooManyInputs(usize),

    #[error("too many outputs: {0}")]
    TooManyOutputs(usize),

    #[error("too many signatures: {0}")]
    TooManySignatures(usize),

    #[error("output {0} has zero amount")]
    ZeroAmount(usize),

    #[error("output {0} token type does not match its token id")]
    TokenTypeMismatch(usize),

    #[error("input {0} is listed twice")]
    DuplicateInput(OutPoint),

    #[error("memo is {0} bytes, maximum is 64")]
    MemoTooLong(usize),

    #[error("memo must be printable ASCII")]
    MemoNotAscii,

    #[error("data field is {0} bytes")]
    DataTooLarge(usize),

    #[error("malformed transaction data: {0}")]
    MalformedData(String),

    #[error("invalid ticker '{0}': 3-32 ASCII alphanumerics, not the native ticker")]
    InvalidTicker(String),

    #[error("description is {0} bytes, maximum is 64")]
    DescriptionTooLong(usize),

    #[error("description must be printable ASCII")]
    InvalidDescription,

    #[error("max mint {0} outside 1..=21000000")]
    MaxMintOutOfRange(u64),

    #[error("max decimals {0} outside 0..=8")]
    DecimalsOutOfRange(u8),

    #[error("pool fee {0} bps outside 10..=1000")]
    PoolFeeOutOfRange(u16),

    #[error("both sides name the same token")]
    IdenticalTokens,

    #[error("{0} must be non-zero")]
    ZeroParameter(&'static str),

    #[error("transaction is not signed")]
    MissingSignature,

    #[error("signature {0} does not verify")]
    InvalidSignature(usize),

    #[error("input {0} is not owned by any embedded public key")]
    OwnerMismatch(usize),

    #[error("locked until height {lock_time}, current height {height}")]
    LockTime { lock_time: u64, height: u64 },

    #[error("timestamp {timestamp} is beyond the allowed window ending at {limit}")]
    FutureTimestamp { timestamp: u64, limit: u64 },

    #[error("wire codec error: {0}")]
    Codec(String),
}
