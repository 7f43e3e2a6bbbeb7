//! # Ledger context
//!
//! [`Ledger`] ties the pieces together: a [`KvStore`], the committed
//! [`LedgerState`] behind a `RwLock`, the [`Mempool`], and the signature
//! scheme. Everything is passed in at construction; there are no globals.
//!
//! ## Locking
//!
//! ```text
//! check_tx     state.read()  → mempool.pending
//! apply_block  state.write() → store.commit → swap → mempool.pending
//! queries      state.read()
//! ```
//!
//! The order never inverts, so the two locks cannot deadlock. A block's
//! writes reach the store in one batch before the in-memory snapshot is
//! swapped; if the commit fails the ledger halts rather than carry on with
//! memory and disk out of step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info};

use crate::address::Address;
use crate::block::{self, TxResult};
use crate::config::LedgerConfig;
use crate::crypto::SignatureScheme;
use crate::engine::ExecContext;
use crate::error::{LedgerError, LedgerResult};
use crate::mempool::{now_millis, Mempool};
use crate::state::{LedgerState, OfferState, Pool, StateView, SwapOffer, TokenInfo, Utxo, ValidatorRecord};
use crate::storage::{KvStore, StoreError};
use crate::transaction::{OfferId, PoolId, TokenId, Transaction, TxId};

/// What a committed block did.
#[derive(Debug, Clone)]
pub struct BlockSummary {
    pub height: u64,
    pub digest: [u8; 32],
    pub results: Vec<TxResult>,
    /// Pending transactions evicted because the block invalidated them.
    pub evicted: usize,
}

impl BlockSummary {
    pub fn applied_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// Ledger status for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
    pub height: u64,
    pub digest: [u8; 32],
    pub unspent_outputs: usize,
    pub tokens: usize,
    pub pools: usize,
    pub validators: usize,
    pub pending: usize,
    pub fees_burned: u128,
    pub halted: bool,
}

pub struct Ledger<S: KvStore> {
    config: LedgerConfig,
    scheme: Arc<dyn SignatureScheme>,
    store: S,
    state: RwLock<LedgerState>,
    mempool: Mempool,
    halted: AtomicBool,
}

impl<S: KvStore> Ledger<S> {
    /// Open a ledger whose state is already in `store`.
    ///
    /// The stored digest is checked against one recomputed from the loaded
    /// records; a mismatch means the store is corrupt.
    pub fn open(store: S, config: LedgerConfig, scheme: Arc<dyn SignatureScheme>) -> LedgerResult<Self> {
        let state = LedgerState::load(&store)?.ok_or(LedgerError::NotInitialized)?;
        let digest = state.digest()?;
        if LedgerState::stored_digest(&store)? != Some(digest) {
            return Err(StoreError::Corrupt {
                key: "m/digest".into(),
                reason: "does not match the stored records".into(),
            }
            .into());
        }
        info!(height = state.height(), digest = %hex::encode(digest), "ledger opened");
        Ok(Self::with_state(store, config, scheme, state))
    }

    /// Write the height-0 state for `allocations` into an empty store.
    pub fn genesis(
        store: S,
        config: LedgerConfig,
        scheme: Arc<dyn SignatureScheme>,
        allocations: &[(Address, u64)],
    ) -> LedgerResult<Self> {
        if LedgerState::load(&store)?.is_some() {
            return Err(LedgerError::AlreadyInitialized);
        }
        let state = block::genesis(allocations)?;
        store.commit(state.to_batch()?)?;
        info!(
            allocations = allocations.len(),
            digest = %hex::encode(state.digest()?),
            "genesis written"
        );
        Ok(Self::with_state(store, config, scheme, state))
    }

    fn with_state(store: S, config: LedgerConfig, scheme: Arc<dyn SignatureScheme>, state: LedgerState) -> Self {
        let mempool = Mempool::new(&config);
        Self {
            config,
            scheme,
            store,
            state: RwLock::new(state),
            mempool,
            halted: AtomicBool::new(false),
        }
    }

    fn ctx(&self) -> ExecContext<'_> {
        ExecContext {
            config: &self.config,
            scheme: self.scheme.as_ref(),
        }
    }

    fn ensure_running(&self) -> LedgerResult<()> {
        if self.halted.load(Ordering::SeqCst) {
            Err(LedgerError::Halted)
        } else {
            Ok(())
        }
    }

    // -- Admission ----------------------------------------------------------

    /// Decode a wire transaction and admit it to the mempool.
    pub fn check_tx(&self, raw: &[u8]) -> LedgerResult<TxId> {
        let tx = Transaction::from_bytes(raw)?;
        self.submit(tx)
    }

    /// Admit an already decoded transaction.
    pub fn submit(&self, tx: Transaction) -> LedgerResult<TxId> {
        self.ensure_running()?;
        let state = self.state.read();
        self.mempool.admit(tx, &*state, &self.ctx(), now_millis())
    }

    /// Pending transactions for the next block, in admission order.
    pub fn propose(&self) -> Vec<Transaction> {
        self.mempool.select(self.config.max_block_txs)
    }

    /// Expire stale mempool entries. Returns how many were removed.
    pub fn expire_pending(&self) -> usize {
        let state = self.state.read();
        self.mempool.expire_old(&*state, &self.ctx(), now_millis() / 1_000)
    }

    // -- Blocks -------------------------------------------------------------

    /// Decode and apply an ordered block of wire transactions. An
    /// undecodable entry rejects the whole block.
    pub fn apply_block(&self, raw_txs: &[Vec<u8>]) -> LedgerResult<BlockSummary> {
        let txs = raw_txs
            .iter()
            .map(|raw| Transaction::from_bytes(raw))
            .collect::<Result<Vec<_>, _>>()?;
        self.apply_transactions(&txs)
    }

    /// Apply an ordered block, persist it, and swap the snapshot in.
    pub fn apply_transactions(&self, txs: &[Transaction]) -> LedgerResult<BlockSummary> {
        self.ensure_running()?;
        let ctx = self.ctx();
        let mut state = self.state.write();

        let outcome = block::apply_block(&state, txs, &ctx)?;
        let batch = outcome.state.delta_batch(&outcome.delta, &outcome.digest)?;
        if let Err(e) = self.store.commit(batch) {
            self.halted.store(true, Ordering::SeqCst);
            error!(height = outcome.height(), error = %e, "block commit failed, ledger halted");
            return Err(e.into());
        }

        let included: Vec<TxId> = outcome.applied().copied().collect();
        *state = outcome.state;
        let evicted = self.mempool.revalidate(&*state, &included, &ctx);

        Ok(BlockSummary {
            height: state.height(),
            digest: outcome.digest,
            results: outcome.results,
            evicted,
        })
    }

    // -- Queries ------------------------------------------------------------

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn height(&self) -> u64 {
        self.state.read().height()
    }

    pub fn digest(&self) -> LedgerResult<[u8; 32]> {
        Ok(self.state.read().digest()?)
    }

    pub fn balance(&self, owner: &Address, token: &TokenId) -> u128 {
        self.state.read().balance(owner, token)
    }

    pub fn list_utxos(&self, owner: &Address, token: Option<&TokenId>) -> Vec<Utxo> {
        self.state.read().list_utxos(owner, token)
    }

    pub fn token(&self, token_id: &TokenId) -> Option<TokenInfo> {
        self.state.read().token(token_id)
    }

    pub fn token_by_ticker(&self, ticker: &str) -> Option<TokenInfo> {
        self.state.read().active_token_by_ticker(ticker)
    }

    /// An offer with its state as of the current height.
    pub fn offer(&self, offer_id: &OfferId) -> Option<(SwapOffer, OfferState)> {
        let state = self.state.read();
        state.offer(offer_id).map(|offer| {
            let effective = offer.effective_state(state.height());
            (offer, effective)
        })
    }

    pub fn pool(&self, pool_id: &PoolId) -> Option<Pool> {
        self.state.read().pool(pool_id)
    }

    pub fn pool_for_pair(&self, a: &TokenId, b: &TokenId) -> Option<Pool> {
        self.state.read().pool_for_pair(a, b)
    }

    pub fn validators(&self) -> Vec<ValidatorRecord> {
        self.state.read().validators().cloned().collect()
    }

    pub fn status(&self) -> LedgerResult<LedgerStatus> {
        let state = self.state.read();
        Ok(LedgerStatus {
            height: state.height(),
            digest: state.digest()?,
            unspent_outputs: state.unspent_count(),
            tokens: state.tokens().count(),
            pools: state.pools().count(),
            validators: state.validators().count(),
            pending: self.mempool.len(),
            fees_burned: state.fees_burned(),
            halted: self.is_halted(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GENESIS_TX_ID;
    use crate::crypto::{Ed25519Scheme, KeyPair};
    use crate::storage::MemoryStore;
    use crate::transaction::{sign_transaction, OutPoint, TransactionBuilder, TxOutput, TxType};

    fn scheme() -> Arc<dyn SignatureScheme> {
        Arc::new(Ed25519Scheme)
    }

    fn alice() -> KeyPair {
        KeyPair::from_seed(&[1; 32])
    }

    fn ledger() -> Ledger<Arc<MemoryStore>> {
        Ledger::genesis(
            Arc::new(MemoryStore::new()),
            LedgerConfig::devnet(),
            scheme(),
            &[(alice().address(), 1_000)],
        )
        .unwrap()
    }

    fn send_to_self(amount: u64) -> Transaction {
        let key = alice();
        let mut tx = TransactionBuilder::new(TxType::Send)
            .input(OutPoint::new(GENESIS_TX_ID, 0))
            .output(TxOutput::native(amount, key.address()))
            .build();
        sign_transaction(&mut tx, &key);
        tx
    }

    #[test]
    fn genesis_twice_is_refused() {
        let store = Arc::new(MemoryStore::new());
        Ledger::genesis(store.clone(), LedgerConfig::devnet(), scheme(), &[]).unwrap();
        assert!(matches!(
            Ledger::genesis(store, LedgerConfig::devnet(), scheme(), &[]),
            Err(LedgerError::AlreadyInitialized)
        ));
    }

    #[test]
    fn open_requires_genesis() {
        assert!(matches!(
            Ledger::open(MemoryStore::new(), LedgerConfig::devnet(), scheme()),
            Err(LedgerError::NotInitialized)
        ));
    }

    #[test]
    fn check_tx_then_block() {
        let ledger = ledger();
        let raw = send_to_self(1_000).to_bytes().unwrap();
        let tx_id = ledger.check_tx(&raw).unwrap();
        assert_eq!(ledger.mempool().len(), 1);

        let summary = ledger.apply_block(&[raw]).unwrap();
        assert_eq!(summary.height, 1);
        assert_eq!(summary.applied_count(), 1);
        assert_eq!(summary.results[0].tx_id, tx_id);
        assert!(ledger.mempool().is_empty());
        assert_eq!(ledger.digest().unwrap(), summary.digest);
    }

    #[test]
    fn fresh_entries_survive_expiry() {
        let ledger = ledger();
        ledger.submit(send_to_self(1_000)).unwrap();
        assert_eq!(ledger.expire_pending(), 0);
        assert_eq!(ledger.propose().len(), 1);
    }

    #[test]
    fn garbage_is_rejected_at_check() {
        let ledger = ledger();
        assert!(matches!(
            ledger.check_tx(&[0xFF; 7]),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn status_reports_counts() {
        let ledger = ledger();
        let status = ledger.status().unwrap();
        assert_eq!(status.height, 0);
        assert_eq!(status.unspent_outputs, 1);
        assert_eq!(status.tokens, 1);
        assert!(!status.halted);
    }
}
