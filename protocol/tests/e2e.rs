//! End-to-end tests for the Shadow ledger.
//!
//! These drive a full `Ledger` the way an operator would: wire bytes into
//! `check_tx`, a proposal out of the mempool, the block applied and
//! persisted. Each test owns its own store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use shadow_protocol::block::GENESIS_TX_ID;
use shadow_protocol::crypto::{Ed25519Scheme, KeyPair, SignatureScheme};
use shadow_protocol::engine::swap_output;
use shadow_protocol::state::OfferState;
use shadow_protocol::storage::{KvStore, MemoryStore, SledStore, StoreError, StoreResult, WriteBatch};
use shadow_protocol::transaction::{
    sign_transaction, AcceptOfferParams, CreatePoolParams, MintParams, OfferParams, OutPoint,
    SwapParams, TokenId, TokenType, Transaction, TransactionBuilder, TxOutput, TxType,
};
use shadow_protocol::{BlockSummary, Ledger, LedgerConfig, LedgerError};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const ALICE_FUNDS: u64 = 10_000_000_000;
const BOB_FUNDS: u64 = 1_000_000;

fn alice() -> KeyPair {
    KeyPair::from_seed(&[0xA1; 32])
}

fn bob() -> KeyPair {
    KeyPair::from_seed(&[0xB0; 32])
}

fn scheme() -> Arc<dyn SignatureScheme> {
    Arc::new(Ed25519Scheme)
}

fn allocations() -> Vec<(shadow_protocol::address::Address, u64)> {
    vec![(alice().address(), ALICE_FUNDS), (bob().address(), BOB_FUNDS)]
}

fn memory_ledger() -> Ledger<MemoryStore> {
    Ledger::genesis(MemoryStore::new(), LedgerConfig::devnet(), scheme(), &allocations())
        .expect("genesis")
}

fn signed(builder: TransactionBuilder, key: &KeyPair) -> Transaction {
    let mut tx = builder.build();
    sign_transaction(&mut tx, key);
    tx
}

fn inputs<S: KvStore>(ledger: &Ledger<S>, key: &KeyPair, token: &TokenId) -> Vec<OutPoint> {
    ledger
        .list_utxos(&key.address(), Some(token))
        .into_iter()
        .map(|u| u.out_point)
        .collect()
}

fn balance<S: KvStore>(ledger: &Ledger<S>, key: &KeyPair, token: &TokenId) -> u64 {
    ledger.balance(&key.address(), token) as u64
}

/// Admit `txs` over the wire, then commit the mempool's proposal.
fn commit<S: KvStore>(ledger: &Ledger<S>, txs: &[Transaction]) -> BlockSummary {
    for tx in txs {
        ledger.check_tx(&tx.to_bytes().expect("encode")).expect("admission");
    }
    let summary = ledger.apply_transactions(&ledger.propose()).expect("block");
    assert_eq!(summary.applied_count(), txs.len(), "{:?}", summary.results);
    summary
}

fn send(ledger: &Ledger<impl KvStore>, from: &KeyPair, to: &KeyPair, amount: u64) -> Transaction {
    let have = balance(ledger, from, &TokenId::NATIVE);
    let mut builder = TransactionBuilder::new(TxType::Send)
        .inputs(inputs(ledger, from, &TokenId::NATIVE))
        .output(TxOutput::native(amount, to.address()));
    if have > amount {
        builder = builder.output(TxOutput::native(have - amount, from.address()));
    }
    signed(builder, from)
}

/// Mint, offer, accept, pool, swap: one block each. Returns the blocks so
/// they can be replayed elsewhere.
fn run_market<S: KvStore>(ledger: &Ledger<S>) -> Vec<Vec<Transaction>> {
    let (alice, bob) = (alice(), bob());
    let mut blocks = Vec::new();

    let mint = signed(
        TransactionBuilder::new(TxType::MintToken)
            .params(&MintParams {
                ticker: "gold".into(),
                description: "Gold bars".into(),
                max_mint: 1_000_000,
                max_decimals: 0,
            })
            .unwrap()
            .output(TxOutput::token(1_000_000, alice.address(), TokenId::NATIVE, TokenType::Custom)),
        &alice,
    );
    let gold = TokenId::from(mint.id());
    commit(ledger, &[mint.clone()]);
    blocks.push(vec![mint]);

    let offer = signed(
        TransactionBuilder::new(TxType::Offer)
            .inputs(inputs(ledger, &alice, &gold))
            .params(&OfferParams {
                have_token: gold,
                have_amount: 1_000,
                want_token: TokenId::NATIVE,
                want_amount: 500,
                expires_at_block: None,
            })
            .unwrap()
            .output(TxOutput::token(999_000, alice.address(), gold, TokenType::Custom)),
        &alice,
    );
    commit(ledger, &[offer.clone()]);
    let offer_id = offer.id();
    blocks.push(vec![offer]);

    let accept = signed(
        TransactionBuilder::new(TxType::AcceptOffer)
            .inputs(inputs(ledger, &bob, &TokenId::NATIVE))
            .params(&AcceptOfferParams { offer_id })
            .unwrap()
            .output(TxOutput::native(BOB_FUNDS - 500, bob.address())),
        &bob,
    );
    commit(ledger, &[accept.clone()]);
    blocks.push(vec![accept]);

    let native = balance(ledger, &alice, &TokenId::NATIVE);
    let create = signed(
        TransactionBuilder::new(TxType::CreatePool)
            .inputs(inputs(ledger, &alice, &gold))
            .inputs(inputs(ledger, &alice, &TokenId::NATIVE))
            .params(&CreatePoolParams {
                token_a: gold,
                token_b: TokenId::NATIVE,
                amount_a: 100_000,
                amount_b: 1_000_000,
                fee_basis_points: 30,
            })
            .unwrap()
            .output(TxOutput::token(899_000, alice.address(), gold, TokenType::Custom))
            .output(TxOutput::native(native - 1_000_000, alice.address())),
        &alice,
    );
    commit(ledger, &[create.clone()]);
    let pool_id = create.id();
    blocks.push(vec![create]);

    let expected = swap_output(1_000, 100_000, 1_000_000, 30).unwrap();
    let swap = signed(
        TransactionBuilder::new(TxType::Swap)
            .inputs(inputs(ledger, &bob, &gold))
            .params(&SwapParams {
                pool_id,
                token_in: gold,
                amount_in: 1_000,
                min_amount_out: expected,
            })
            .unwrap(),
        &bob,
    );
    commit(ledger, &[swap.clone()]);
    blocks.push(vec![swap]);

    blocks
}

/// Delegates to memory until told to fail commits.
struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl KvStore for FlakyStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.put(key, value)
    }

    fn scan(&self, start: &[u8], end: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.scan(start, end)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner.commit(batch)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn token_offer_and_pool_lifecycle() {
    let ledger = memory_ledger();
    run_market(&ledger);
    let (alice, bob) = (alice(), bob());

    assert_eq!(ledger.height(), 5);
    let gold = ledger.token_by_ticker("GOLD").expect("gold registered");
    assert_eq!(gold.total_supply, 1_000_000);
    assert_eq!(gold.locked_shadow, 1_000_000);

    // Bob bought 1000 GOLD for 500 and sold it all into the pool.
    let expected = swap_output(1_000, 100_000, 1_000_000, 30).unwrap();
    assert_eq!(balance(&ledger, &bob, &gold.token_id), 0);
    assert_eq!(balance(&ledger, &bob, &TokenId::NATIVE), BOB_FUNDS - 500 + expected);
    assert_eq!(balance(&ledger, &alice, &gold.token_id), 899_000);

    let pool = ledger.pool_for_pair(&TokenId::NATIVE, &gold.token_id).unwrap();
    assert_eq!(pool.reserves_for(&gold.token_id), Some((101_000, 1_000_000 - expected)));
    assert!(pool.k() >= 100_000u128 * 1_000_000);

    let lp = ledger.token(&pool.lp_token_id).unwrap();
    assert_eq!(lp.total_supply, pool.lp_supply);
    assert_eq!(balance(&ledger, &alice, &pool.lp_token_id), pool.lp_supply);

    let status = ledger.status().unwrap();
    assert_eq!(status.pools, 1);
    assert_eq!(status.tokens, 3);
    assert_eq!(status.pending, 0);
}

#[test]
fn accepted_offer_is_terminal() {
    let ledger = memory_ledger();
    let blocks = run_market(&ledger);
    let offer_id = blocks[1][0].id();
    let (offer, state) = ledger.offer(&offer_id).unwrap();
    assert_eq!(state, OfferState::Accepted);
    assert_eq!(offer.have_amount, 1_000);
}

#[test]
fn double_spend_rejected_at_admission() {
    let ledger = memory_ledger();
    let (alice, bob) = (alice(), bob());
    let first = send(&ledger, &alice, &bob, 100);
    let second = send(&ledger, &alice, &bob, 200);

    ledger.check_tx(&first.to_bytes().unwrap()).unwrap();
    let err = ledger.check_tx(&second.to_bytes().unwrap()).unwrap_err();
    assert!(matches!(err, LedgerError::UtxoAlreadySpent(_)), "{err}");
    assert_eq!(ledger.mempool().len(), 1);
}

#[test]
fn concurrent_spends_of_one_output_admit_exactly_one() {
    const THREADS: u64 = 8;
    let ledger = memory_ledger();
    let (alice, bob) = (alice(), bob());
    assert_eq!(inputs(&ledger, &alice, &TokenId::NATIVE).len(), 1);

    // Distinct amounts give distinct transactions over the same input.
    let txs: Vec<Transaction> = (1..=THREADS)
        .map(|i| send(&ledger, &alice, &bob, i * 100))
        .collect();
    let start = Barrier::new(txs.len());

    let results: Vec<Result<_, LedgerError>> = thread::scope(|s| {
        let handles: Vec<_> = txs
            .iter()
            .map(|tx| {
                let (ledger, start) = (&ledger, &start);
                s.spawn(move || {
                    start.wait();
                    ledger.submit(tx.clone())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let admitted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(admitted.len(), 1, "{results:?}");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, LedgerError::UtxoAlreadySpent(_)), "{err}");
    }
    assert_eq!(ledger.mempool().len(), 1);
    assert_eq!(ledger.propose()[0].id(), *admitted[0]);
}

#[test]
fn independent_ledgers_agree_on_digest() {
    let dir = tempfile::tempdir().unwrap();
    let on_disk = Ledger::genesis(
        SledStore::open(dir.path().join("ledger")).unwrap(),
        LedgerConfig::devnet(),
        scheme(),
        &allocations(),
    )
    .unwrap();
    let blocks = run_market(&on_disk);

    // Replay the same blocks directly, without the mempool.
    let replica = memory_ledger();
    for txs in &blocks {
        let summary = replica.apply_transactions(txs).unwrap();
        assert_eq!(summary.applied_count(), txs.len());
    }

    assert_eq!(replica.height(), on_disk.height());
    assert_eq!(replica.digest().unwrap(), on_disk.digest().unwrap());
}

#[test]
fn reopened_store_reproduces_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger");
    let (height, digest) = {
        let ledger = Ledger::genesis(
            SledStore::open(&path).unwrap(),
            LedgerConfig::devnet(),
            scheme(),
            &allocations(),
        )
        .unwrap();
        run_market(&ledger);
        (ledger.height(), ledger.digest().unwrap())
    };

    let reopened = Ledger::open(SledStore::open(&path).unwrap(), LedgerConfig::devnet(), scheme())
        .unwrap();
    assert_eq!(reopened.height(), height);
    assert_eq!(reopened.digest().unwrap(), digest);
    assert!(reopened.token_by_ticker("gold").is_some());
    assert_eq!(reopened.validators().len(), 0);
}

#[test]
fn block_evicts_conflicting_pending_transaction() {
    let ledger = memory_ledger();
    let (alice, bob) = (alice(), bob());
    let pending = send(&ledger, &alice, &bob, 100);
    let unrelated = send(&ledger, &bob, &alice, 100);
    ledger.check_tx(&pending.to_bytes().unwrap()).unwrap();
    ledger.check_tx(&unrelated.to_bytes().unwrap()).unwrap();

    // Another node's block spends alice's output first.
    let rival = send(&ledger, &alice, &alice, 5);
    let summary = ledger.apply_transactions(&[rival]).unwrap();
    assert_eq!(summary.applied_count(), 1);
    assert_eq!(summary.evicted, 1);
    assert!(!ledger.mempool().contains(&pending.id()));
    assert!(ledger.mempool().contains(&unrelated.id()));
}

#[test]
fn store_failure_halts_the_ledger() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        failing: AtomicBool::new(false),
    });
    let ledger = Ledger::genesis(store.clone(), LedgerConfig::devnet(), scheme(), &allocations())
        .unwrap();
    let before = ledger.digest().unwrap();

    store.failing.store(true, Ordering::SeqCst);
    let tx = send(&ledger, &alice(), &bob(), 10);
    let err = ledger.apply_transactions(&[tx.clone()]).unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));
    assert!(err.is_fatal());

    // Memory never moved ahead of the store.
    assert!(ledger.is_halted());
    assert_eq!(ledger.height(), 0);
    assert_eq!(ledger.digest().unwrap(), before);

    store.failing.store(false, Ordering::SeqCst);
    assert!(matches!(ledger.apply_transactions(&[tx.clone()]), Err(LedgerError::Halted)));
    assert!(matches!(ledger.submit(tx), Err(LedgerError::Halted)));
}

#[test]
fn genesis_outputs_are_spendable() {
    let ledger = memory_ledger();
    let alice = alice();
    let utxos = ledger.list_utxos(&alice.address(), None);
    assert_eq!(utxos.len(), 1);
    assert_eq!(utxos[0].out_point, OutPoint::new(GENESIS_TX_ID, 0));
    commit(&ledger, &[send(&ledger, &alice, &bob(), 1)]);
    assert_eq!(balance(&ledger, &bob(), &TokenId::NATIVE), BOB_FUNDS + 1);
}
