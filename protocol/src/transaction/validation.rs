//! Stateless transaction validation.
//!
//! Every check here is a pure function of the transaction plus whatever
//! already-resolved values the caller passes in. Nothing reads or writes
//! ledger state, which keeps these checks safe to run under any lock.
//!
//! The executor runs them in this order:
//!
//! 1. [`validate_structure`] (shape, limits, per-type parameters)
//! 2. [`validate_signatures`] (every embedded signature verifies)
//! 3. [`validate_lock_time`] against the height being applied
//! 4. [`validate_input_owner`] per input, once its UTXO is resolved
//!
//! [`validate_timestamp`] is only run at mempool admission. Wall-clock time
//! must never influence block application, or replicas would diverge.

use std::collections::BTreeSet;

use super::builder::Transaction;
use super::params::{
    AcceptOfferParams, AddLiquidityParams, CancelOfferParams, CreatePoolParams, MeltParams,
    MintParams, OfferParams, RemoveLiquidityParams, SwapParams, TxParams,
};
use super::types::{TokenType, TxType};
use super::ValidationError;
use crate::address::Address;
use crate::config::{
    MAX_DATA_LENGTH, MAX_MEMO_LENGTH, MAX_TX_INPUTS, MAX_TX_OUTPUTS, MAX_TX_SIGNATURES, TX_VERSION,
};
use crate::crypto::SignatureScheme;

/// Shape checks: version, counts, amounts, memo, data, and the stateless
/// rules of the type's parameters.
pub fn validate_structure(tx: &Transaction) -> Result<(), ValidationError> {
    if tx.version != TX_VERSION {
        return Err(ValidationError::UnsupportedVersion(tx.version));
    }

    if tx.tx_type.is_creation() {
        if !tx.inputs.is_empty() {
            return Err(ValidationError::UnexpectedInputs(tx.tx_type));
        }
    } else if tx.inputs.is_empty() {
        return Err(ValidationError::MissingInputs(tx.tx_type));
    }

    // Engine-driven types may consist of change-only (or no) user outputs.
    let needs_outputs = matches!(tx.tx_type, TxType::Coinbase | TxType::Send | TxType::MintToken);
    if needs_outputs && tx.outputs.is_empty() {
        return Err(ValidationError::MissingOutputs(tx.tx_type));
    }

    if tx.inputs.len() > MAX_TX_INPUTS {
        return Err(ValidationError::TooManyInputs(tx.inputs.len()));
    }
    if tx.outputs.len() > MAX_TX_OUTPUTS {
        return Err(ValidationError::TooManyOutputs(tx.outputs.len()));
    }
    if tx.signatures.len() > MAX_TX_SIGNATURES {
        return Err(ValidationError::TooManySignatures(tx.signatures.len()));
    }

    let mut seen = BTreeSet::new();
    for out_point in tx.out_points() {
        if !seen.insert(out_point) {
            return Err(ValidationError::DuplicateInput(out_point));
        }
    }

    for (index, output) in tx.outputs.iter().enumerate() {
        if output.amount == 0 {
            return Err(ValidationError::ZeroAmount(index));
        }
        // Mint outputs name the token before it has an id: Custom type with
        // the zero id as a placeholder for the transaction's own id.
        let consistent = if tx.tx_type == TxType::MintToken {
            output.token_type == TokenType::Custom && output.token_id.is_native()
        } else {
            (output.token_type == TokenType::Native) == output.token_id.is_native()
        };
        if !consistent {
            return Err(ValidationError::TokenTypeMismatch(index));
        }
    }

    if let Some(memo) = &tx.memo {
        if memo.len() > MAX_MEMO_LENGTH {
            return Err(ValidationError::MemoTooLong(memo.len()));
        }
        if !memo.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Err(ValidationError::MemoNotAscii);
        }
    }

    if let Some(data) = &tx.data {
        if data.len() > MAX_DATA_LENGTH {
            return Err(ValidationError::DataTooLarge(data.len()));
        }
    }

    match tx.tx_type {
        TxType::Coinbase | TxType::Send | TxType::RegisterValidator => Ok(()),
        TxType::MintToken => check_params::<MintParams>(tx),
        TxType::Melt => check_params::<MeltParams>(tx),
        TxType::Offer => check_params::<OfferParams>(tx),
        TxType::AcceptOffer => check_params::<AcceptOfferParams>(tx),
        TxType::CancelOffer => check_params::<CancelOfferParams>(tx),
        TxType::CreatePool => check_params::<CreatePoolParams>(tx),
        TxType::AddLiquidity => check_params::<AddLiquidityParams>(tx),
        TxType::RemoveLiquidity => check_params::<RemoveLiquidityParams>(tx),
        TxType::Swap => check_params::<SwapParams>(tx),
    }
}

fn check_params<P: TxParams>(tx: &Transaction) -> Result<(), ValidationError> {
    tx.params::<P>()?.check()
}

/// Every embedded signature must verify over the signable bytes. Only a
/// coinbase may carry none.
pub fn validate_signatures(
    tx: &Transaction,
    scheme: &dyn SignatureScheme,
) -> Result<(), ValidationError> {
    if tx.signatures.is_empty() {
        return if tx.tx_type == TxType::Coinbase {
            Ok(())
        } else {
            Err(ValidationError::MissingSignature)
        };
    }

    let message = tx.signable_bytes();
    for (index, sig) in tx.signatures.iter().enumerate() {
        if !scheme.verify(&message, &sig.public_key, &sig.signature) {
            return Err(ValidationError::InvalidSignature(index));
        }
    }
    Ok(())
}

/// Structure plus signatures: everything that can be checked without state.
pub fn validate(tx: &Transaction, scheme: &dyn SignatureScheme) -> Result<(), ValidationError> {
    validate_structure(tx)?;
    validate_signatures(tx, scheme)
}

/// The address on the spent output must be one of the signers'.
pub fn validate_input_owner(
    input_index: usize,
    owner: &Address,
    signers: &[Address],
) -> Result<(), ValidationError> {
    if signers.contains(owner) {
        Ok(())
    } else {
        Err(ValidationError::OwnerMismatch(input_index))
    }
}

/// A transaction locked to a later height cannot apply at `height`.
pub fn validate_lock_time(tx: &Transaction, height: u64) -> Result<(), ValidationError> {
    if tx.lock_time > height {
        Err(ValidationError::LockTime {
            lock_time: tx.lock_time,
            height,
        })
    } else {
        Ok(())
    }
}

/// Admission-only clock check.
pub fn validate_timestamp(
    tx: &Transaction,
    now_ms: u64,
    max_future_ms: u64,
) -> Result<(), ValidationError> {
    let limit = now_ms.saturating_add(max_future_ms);
    if tx.timestamp > limit {
        Err(ValidationError::FutureTimestamp {
            timestamp: tx.timestamp,
            limit,
        })
    } else {
        Ok(())
    }
}
