//! # Protocol Configuration & Constants
//!
//! Every consensus-relevant number in the Shadow ledger lives here. Two kinds
//! of values exist:
//!
//! - **Constants** are part of the protocol itself. Two nodes that disagree
//!   on any of them will disagree on state digests, so they are compile-time
//!   `const`s and never read from a file.
//! - **[`LedgerConfig`]** holds the economic knobs an operator network agrees
//!   on at genesis (fees, block reward, stake sizes) plus purely local
//!   mempool tuning. It is `serde`-friendly so the node binary can load it
//!   from TOML.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full version string of the ledger rules.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Transaction format version. Anything else is rejected at validation.
pub const TX_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Native Asset
// ---------------------------------------------------------------------------

/// Ticker of the network's base asset. Reserved: no custom token may use it.
pub const NATIVE_TICKER: &str = "SHADOW";

/// Display decimals of the base asset. Amounts on the wire are always
/// integers in the smallest unit.
pub const NATIVE_DECIMALS: u8 = 8;

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Raw address length in bytes (BLAKE3 output).
pub const ADDRESS_BYTES: usize = 32;

/// Encoded address length: prefix + 64 hex chars + check digit.
pub const ENCODED_ADDRESS_LENGTH: usize = 1 + ADDRESS_BYTES * 2 + 1;

/// BLAKE3 derive-key context for keyless escrow addresses.
pub const ESCROW_ADDRESS_CONTEXT: &str = "shadow-ledger 2026 offer escrow address";

/// BLAKE3 derive-key context for pool reserve addresses.
pub const POOL_ADDRESS_CONTEXT: &str = "shadow-ledger 2026 pool reserve address";

// ---------------------------------------------------------------------------
// Transaction Limits
// ---------------------------------------------------------------------------

/// Maximum memo length in bytes. Memos must be printable ASCII.
pub const MAX_MEMO_LENGTH: usize = 64;

/// Maximum size of the opaque `data` field in bytes.
pub const MAX_DATA_LENGTH: usize = 1024;

/// Maximum number of inputs per transaction.
pub const MAX_TX_INPUTS: usize = 256;

/// Maximum number of outputs per transaction.
pub const MAX_TX_OUTPUTS: usize = 256;

/// Maximum number of embedded signatures per transaction.
pub const MAX_TX_SIGNATURES: usize = 16;

/// Maximum wire size of one transaction. Sized for post-quantum signatures,
/// which run to kilobytes each.
pub const MAX_TX_BYTES: u64 = 256 * 1024;

// ---------------------------------------------------------------------------
// Token Economics
// ---------------------------------------------------------------------------

/// Shortest allowed custom-token ticker.
pub const MIN_TICKER_LENGTH: usize = 3;

/// Longest allowed custom-token ticker.
pub const MAX_TICKER_LENGTH: usize = 32;

/// Longest allowed token description.
pub const MAX_DESCRIPTION_LENGTH: usize = 64;

/// Upper bound of `max_mint` (whole units before decimals are applied).
pub const MAX_MINT: u64 = 21_000_000;

/// Upper bound of `max_decimals`.
pub const MAX_DECIMALS: u8 = 8;

/// Ceiling for LP supply: the largest total supply any token can encode.
/// `21_000_000 * 10^8` fits comfortably in a `u64`.
pub const MAX_TOKEN_SUPPLY: u64 = MAX_MINT * 100_000_000;

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// Lowest pool fee: 0.1%.
pub const MIN_POOL_FEE_BPS: u16 = 10;

/// Highest pool fee: 10%.
pub const MAX_POOL_FEE_BPS: u16 = 1_000;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Allowed deviation of an AddLiquidity deposit from the reserve ratio,
/// in percent.
pub const RATIO_TOLERANCE_PERCENT: u128 = 1;

/// Suffix appended to `{tickerA}{tickerB}` to form an LP ticker.
pub const LP_TICKER_SUFFIX: &str = "LP";

/// Decimals of every LP token.
pub const LP_DECIMALS: u8 = 8;

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Economic and operational parameters of a ledger instance.
///
/// The first group of fields is consensus-relevant and must be identical on
/// every node; the mempool group is local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Minimum native fee every non-coinbase transaction must leave behind.
    pub min_fee: u64,

    /// Upper bound on the total value a block's coinbase may create.
    pub block_reward: u64,

    /// Native amount locked by `RegisterValidator`.
    pub validator_stake: u64,

    /// Maximum number of transactions applied per block.
    pub max_block_txs: usize,

    /// How far in the future (ms) a transaction timestamp may be at admission.
    pub max_future_ms: u64,

    /// Maximum number of pending mempool entries.
    pub mempool_max_size: usize,

    /// Seconds after which a pending entry is dropped by
    /// [`Mempool::expire_old`](crate::mempool::Mempool::expire_old).
    pub mempool_expiry_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_fee: 1_000,
            block_reward: 50 * 100_000_000,
            validator_stake: 10_000 * 100_000_000,
            max_block_txs: 5_000,
            max_future_ms: 2 * 60 * 60 * 1_000,
            mempool_max_size: 10_000,
            mempool_expiry_secs: 3_600,
        }
    }
}

impl LedgerConfig {
    /// A configuration with zero fees and a tiny validator stake. Handy in
    /// tests where fee accounting would only add noise.
    pub fn devnet() -> Self {
        Self {
            min_fee: 0,
            validator_stake: 1_000,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_address_is_66_chars() {
        assert_eq!(ENCODED_ADDRESS_LENGTH, 66);
    }

    #[test]
    fn max_supply_fits_u64() {
        assert_eq!(MAX_TOKEN_SUPPLY, 2_100_000_000_000_000);
        assert!(MAX_TOKEN_SUPPLY < u64::MAX);
    }

    #[test]
    fn fee_bounds_are_ordered() {
        assert!(MIN_POOL_FEE_BPS < MAX_POOL_FEE_BPS);
        assert!((MAX_POOL_FEE_BPS as u64) < BPS_DENOMINATOR);
    }

    #[test]
    fn config_deserializes_with_missing_fields() {
        let cfg: LedgerConfig = serde_json::from_str(r#"{"min_fee": 5}"#).unwrap();
        assert_eq!(cfg.min_fee, 5);
        assert_eq!(cfg.block_reward, LedgerConfig::default().block_reward);
    }

    #[test]
    fn devnet_has_no_fee() {
        assert_eq!(LedgerConfig::devnet().min_fee, 0);
    }
}
