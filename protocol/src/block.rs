//! Genesis and block application.
//!
//! [`apply_block`] is a pure function of the prior snapshot and the ordered
//! transaction list: every node that feeds it the same input gets the same
//! state and the same digest. It never touches storage; persisting the
//! outcome is the ledger's job.
//!
//! Transactions are applied one by one against an overlay of everything
//! applied before them in the block. A transaction that fails is recorded
//! in the results and excluded; it does not fail the block.

use tracing::{info, warn};

use crate::address::Address;
use crate::config::{MAX_MINT, NATIVE_DECIMALS, NATIVE_TICKER};
use crate::engine::{apply_transaction, ExecContext};
use crate::error::{LedgerError, LedgerResult};
use crate::state::{LedgerState, Overlay, StateDelta, StateView, TokenInfo, Utxo};
use crate::transaction::{OutPoint, TokenId, TokenType, Transaction, TxId, TxOutput, TxType};

/// Transaction id of the genesis allocations. Allocation `i` lives at
/// `(GENESIS_TX_ID, i)`.
pub const GENESIS_TX_ID: TxId = TxId([0u8; 32]);

/// Build the height-0 state: the base-asset registry entry plus one UTXO
/// per allocation. Zero allocations are skipped but keep their index.
pub fn genesis(allocations: &[(Address, u64)]) -> LedgerResult<LedgerState> {
    let mut delta = StateDelta::default();
    let mut issued: u64 = 0;

    for (index, (owner, amount)) in allocations.iter().enumerate() {
        if *amount == 0 {
            continue;
        }
        issued = issued.checked_add(*amount).ok_or(LedgerError::Overflow)?;
        let index = u32::try_from(index).map_err(|_| LedgerError::Overflow)?;
        let out_point = OutPoint::new(GENESIS_TX_ID, index);
        delta.utxos.insert(
            out_point,
            Utxo {
                out_point,
                output: TxOutput::native(*amount, *owner),
                block_height: 0,
                is_spent: false,
            },
        );
    }

    delta.tokens.insert(
        TokenId::NATIVE,
        TokenInfo {
            token_id: TokenId::NATIVE,
            ticker: NATIVE_TICKER.to_string(),
            description: "Shadow base asset".to_string(),
            max_mint: MAX_MINT,
            max_decimals: NATIVE_DECIMALS,
            total_supply: issued,
            locked_shadow: 0,
            total_melted: 0,
            creator: Address::from_bytes([0u8; 32]),
            is_shadow: true,
            fully_melted: false,
            kind: TokenType::Native,
            created_at: 0,
        },
    );

    let mut state = LedgerState::default();
    state.apply(&delta, 0);
    Ok(state)
}

/// Outcome of one transaction within a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub tx_id: TxId,
    pub success: bool,
    pub error: Option<String>,
}

/// Everything [`apply_block`] produces.
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    /// The prior state with every successful transaction applied.
    pub state: LedgerState,
    /// The combined writes of the successful transactions.
    pub delta: StateDelta,
    /// One entry per input transaction, in input order.
    pub results: Vec<TxResult>,
    pub digest: [u8; 32],
}

impl BlockOutcome {
    pub fn height(&self) -> u64 {
        self.state.height()
    }

    pub fn applied(&self) -> impl Iterator<Item = &TxId> + '_ {
        self.results.iter().filter(|r| r.success).map(|r| &r.tx_id)
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// Apply `txs` in order on top of `prior` at height `prior + 1`.
///
/// At most one coinbase applies per block and at most `max_block_txs`
/// transactions are considered; anything past that is recorded as failed.
/// The only block-level error is a failure to compute the digest.
pub fn apply_block(
    prior: &LedgerState,
    txs: &[Transaction],
    ctx: &ExecContext<'_>,
) -> LedgerResult<BlockOutcome> {
    let height = prior.height() + 1;
    let limit = ctx.config.max_block_txs;
    let mut delta = StateDelta::default();
    let mut results = Vec::with_capacity(txs.len());
    let mut coinbase_applied = false;

    for (position, tx) in txs.iter().enumerate() {
        let tx_id = tx.id();
        let applied = if position >= limit {
            Err(LedgerError::BlockFull { limit })
        } else if tx.tx_type == TxType::Coinbase && coinbase_applied {
            Err(LedgerError::DuplicateCoinbase)
        } else {
            let view = Overlay::new(prior, &delta).at_height(height);
            apply_transaction(tx, &view, ctx)
        };

        match applied {
            Ok(tx_delta) => {
                if tx.tx_type == TxType::Coinbase {
                    coinbase_applied = true;
                }
                delta.merge(tx_delta);
                results.push(TxResult {
                    tx_id,
                    success: true,
                    error: None,
                });
            }
            Err(e) => {
                warn!(%tx_id, height, error = %e, "transaction excluded from block");
                results.push(TxResult {
                    tx_id,
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let mut state = prior.clone();
    state.apply(&delta, height);
    let digest = state.digest()?;

    let outcome = BlockOutcome {
        state,
        delta,
        results,
        digest,
    };
    info!(
        height,
        applied = outcome.applied().count(),
        failed = outcome.failed_count(),
        digest = %hex::encode(digest),
        "block applied"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::crypto::{Ed25519Scheme, KeyPair};
    use crate::transaction::{sign_transaction, TransactionBuilder};

    struct Fixture {
        state: LedgerState,
        config: LedgerConfig,
        alice: KeyPair,
        bob: KeyPair,
    }

    fn fixture() -> Fixture {
        let alice = KeyPair::from_seed(&[1; 32]);
        let bob = KeyPair::from_seed(&[2; 32]);
        let state = genesis(&[(alice.address(), 1_000), (bob.address(), 500)]).unwrap();
        Fixture {
            state,
            config: LedgerConfig::devnet(),
            alice,
            bob,
        }
    }

    fn pay(from: &KeyPair, input: OutPoint, to: Address, amount: u64) -> Transaction {
        let mut tx = TransactionBuilder::new(TxType::Send)
            .timestamp(1_700_000_000_000)
            .input(input)
            .output(TxOutput::native(amount, to))
            .build();
        sign_transaction(&mut tx, from);
        tx
    }

    fn coinbase(to: Address, amount: u64, nonce: u64) -> Transaction {
        TransactionBuilder::new(TxType::Coinbase)
            .timestamp(nonce)
            .output(TxOutput::native(amount, to))
            .build()
    }

    fn run(f: &Fixture, txs: &[Transaction]) -> BlockOutcome {
        let ctx = ExecContext {
            config: &f.config,
            scheme: &Ed25519Scheme,
        };
        apply_block(&f.state, txs, &ctx).unwrap()
    }

    #[test]
    fn genesis_registers_base_asset() {
        let f = fixture();
        assert_eq!(f.state.height(), 0);
        let native = f.state.token(&TokenId::NATIVE).unwrap();
        assert!(native.is_shadow);
        assert_eq!(native.total_supply, 1_500);
        assert_eq!(native.ticker, NATIVE_TICKER);
        assert_eq!(f.state.balance(&f.alice.address(), &TokenId::NATIVE), 1_000);
        assert!(f.state.utxo(&OutPoint::new(GENESIS_TX_ID, 1)).is_some());
    }

    #[test]
    fn genesis_is_deterministic() {
        let a = fixture().state.digest().unwrap();
        let b = fixture().state.digest().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn later_transactions_see_earlier_ones() {
        let f = fixture();
        let first = pay(&f.alice, OutPoint::new(GENESIS_TX_ID, 0), f.bob.address(), 1_000);
        let second = pay(&f.bob, OutPoint::new(first.id(), 0), f.alice.address(), 1_000);
        let outcome = run(&f, &[first, second]);

        assert_eq!(outcome.height(), 1);
        assert_eq!(outcome.failed_count(), 0);
        assert_eq!(outcome.state.balance(&f.alice.address(), &TokenId::NATIVE), 1_000);
        assert_eq!(outcome.digest, outcome.state.digest().unwrap());
    }

    #[test]
    fn failed_transaction_is_excluded() {
        let f = fixture();
        let input = OutPoint::new(GENESIS_TX_ID, 0);
        let first = pay(&f.alice, input, f.bob.address(), 1_000);
        let conflict = pay(&f.alice, input, f.alice.address(), 999);
        let outcome = run(&f, &[first.clone(), conflict]);

        assert!(outcome.results[0].success);
        assert!(!outcome.results[1].success);
        assert!(outcome.results[1].error.as_deref().unwrap().contains("already spent"));
        assert_eq!(outcome.applied().copied().collect::<Vec<_>>(), vec![first.id()]);
    }

    #[test]
    fn one_coinbase_per_block() {
        let f = fixture();
        let outcome = run(
            &f,
            &[coinbase(f.bob.address(), 10, 1), coinbase(f.bob.address(), 10, 2)],
        );
        assert!(outcome.results[0].success);
        assert!(!outcome.results[1].success);
        assert_eq!(outcome.state.balance(&f.bob.address(), &TokenId::NATIVE), 510);
    }

    #[test]
    fn transactions_past_the_limit_fail() {
        let mut f = fixture();
        f.config.max_block_txs = 1;
        let outcome = run(
            &f,
            &[
                pay(&f.alice, OutPoint::new(GENESIS_TX_ID, 0), f.bob.address(), 1_000),
                pay(&f.bob, OutPoint::new(GENESIS_TX_ID, 1), f.alice.address(), 500),
            ],
        );
        assert_eq!(outcome.failed_count(), 1);
        assert!(outcome.results[1].error.as_deref().unwrap().contains("maximum"));
    }

    #[test]
    fn empty_block_advances_height_only() {
        let f = fixture();
        let outcome = run(&f, &[]);
        assert_eq!(outcome.height(), 1);
        assert!(outcome.delta.is_empty());
        assert_ne!(outcome.digest, f.state.digest().unwrap());
    }
}
