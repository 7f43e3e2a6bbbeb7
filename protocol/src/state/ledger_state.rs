//! The committed ledger snapshot.
//!
//! `LedgerState` owns every record plus three derived indexes (unspent
//! outpoints per owner, active tickers, pool pairs). It changes only through
//! [`LedgerState::apply`], which folds in a finished [`StateDelta`]; the
//! block executor builds a fresh copy and the ledger swaps it in after the
//! delta is durable.

use std::collections::{BTreeMap, BTreeSet};

use crate::address::Address;
use crate::crypto::{blake3_hash_multi, merkle_root};
use crate::storage::{self, keys, KvStore, StoreError, StoreResult, WriteBatch};
use crate::transaction::{OfferId, OutPoint, PoolId, TokenId};

use super::records::{ordered_pair, Pool, SwapOffer, TokenInfo, Utxo, ValidatorRecord};
use super::view::{StateDelta, StateView};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    height: u64,
    fees_burned: u128,
    utxos: BTreeMap<OutPoint, Utxo>,
    tokens: BTreeMap<TokenId, TokenInfo>,
    offers: BTreeMap<OfferId, SwapOffer>,
    pools: BTreeMap<PoolId, Pool>,
    validators: BTreeMap<Address, ValidatorRecord>,

    by_owner: BTreeMap<Address, BTreeSet<OutPoint>>,
    tickers: BTreeMap<String, TokenId>,
    pairs: BTreeMap<(TokenId, TokenId), PoolId>,
}

impl LedgerState {
    /// Total native value burned as fees since genesis.
    pub fn fees_burned(&self) -> u128 {
        self.fees_burned
    }

    /// Fold `delta` in and move to `height`.
    pub fn apply(&mut self, delta: &StateDelta, height: u64) {
        for (out_point, utxo) in &delta.utxos {
            let owned = self.by_owner.entry(*utxo.owner()).or_default();
            if utxo.is_spent {
                owned.remove(out_point);
            } else {
                owned.insert(*out_point);
            }
            self.utxos.insert(*out_point, utxo.clone());
        }
        self.by_owner.retain(|_, set| !set.is_empty());

        for (token_id, token) in &delta.tokens {
            self.index_token(token);
            self.tokens.insert(*token_id, token.clone());
        }
        for (offer_id, offer) in &delta.offers {
            self.offers.insert(*offer_id, offer.clone());
        }
        for (pool_id, pool) in &delta.pools {
            self.pairs.insert((pool.token_a, pool.token_b), *pool_id);
            self.pools.insert(*pool_id, pool.clone());
        }
        for (address, record) in &delta.validators {
            self.validators.insert(*address, record.clone());
        }

        self.fees_burned = self.fees_burned.saturating_add(delta.fees);
        self.height = height;
    }

    fn index_token(&mut self, token: &TokenInfo) {
        let ticker = token.ticker.to_ascii_uppercase();
        if token.holds_ticker() {
            self.tickers.insert(ticker, token.token_id);
        } else if self.tickers.get(&ticker) == Some(&token.token_id) {
            self.tickers.remove(&ticker);
        }
    }

    // -- Queries ------------------------------------------------------------

    /// Sum of unspent outputs of `token` owned by `owner`.
    pub fn balance(&self, owner: &Address, token: &TokenId) -> u128 {
        self.unspent_iter(owner)
            .filter(|u| u.token_id() == token)
            .map(|u| u128::from(u.amount()))
            .sum()
    }

    /// Unspent outputs of `owner`, sorted by outpoint.
    pub fn list_utxos(&self, owner: &Address, token: Option<&TokenId>) -> Vec<Utxo> {
        self.unspent_by_owner(owner, token)
    }

    fn unspent_iter<'a>(&'a self, owner: &Address) -> impl Iterator<Item = &'a Utxo> + 'a {
        self.by_owner
            .get(owner)
            .into_iter()
            .flatten()
            .filter_map(move |op| self.utxos.get(op))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenInfo> + '_ {
        self.tokens.values()
    }

    pub fn offers(&self) -> impl Iterator<Item = &SwapOffer> + '_ {
        self.offers.values()
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> + '_ {
        self.pools.values()
    }

    pub fn validators(&self) -> impl Iterator<Item = &ValidatorRecord> + '_ {
        self.validators.values()
    }

    /// Number of unspent outputs across all owners.
    pub fn unspent_count(&self) -> usize {
        self.by_owner.values().map(BTreeSet::len).sum()
    }

    // -- Digest -------------------------------------------------------------

    /// Merkle root over every stored record.
    ///
    /// Each leaf is `blake3(len(key) || key || value)`, where key and value
    /// are exactly what [`LedgerState::to_batch`] would write. Leaves are
    /// sorted by key, so two states with the same records and height hash
    /// identically no matter how they were built.
    pub fn digest(&self) -> StoreResult<[u8; 32]> {
        let mut entries = self.entries()?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let leaves: Vec<[u8; 32]> = entries
            .iter()
            .map(|(key, value)| {
                let len = (key.len() as u32).to_le_bytes();
                blake3_hash_multi(&[&len, key, value])
            })
            .collect();
        Ok(merkle_root(&leaves))
    }

    fn entries(&self) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = Vec::with_capacity(
            self.utxos.len() + self.tokens.len() + self.offers.len() + self.pools.len() + 2,
        );
        for (op, utxo) in &self.utxos {
            entries.push((keys::utxo(op), storage::encode(utxo)?));
        }
        for (id, token) in &self.tokens {
            entries.push((keys::token(id), storage::encode(token)?));
        }
        for (id, offer) in &self.offers {
            entries.push((keys::offer(id), storage::encode(offer)?));
        }
        for (id, pool) in &self.pools {
            entries.push((keys::pool(id), storage::encode(pool)?));
        }
        for (address, record) in &self.validators {
            entries.push((keys::validator(address), storage::encode(record)?));
        }
        entries.push((keys::META_HEIGHT.to_vec(), self.height.to_be_bytes().to_vec()));
        entries.push((keys::META_FEES.to_vec(), storage::encode(&self.fees_burned)?));
        Ok(entries)
    }

    // -- Persistence --------------------------------------------------------

    /// Every record of this state as one batch. Used for genesis.
    pub fn to_batch(&self) -> StoreResult<WriteBatch> {
        let mut batch = WriteBatch::new();
        for (key, value) in self.entries()? {
            batch.put(key, value);
        }
        batch.put(keys::META_DIGEST.to_vec(), self.digest()?.to_vec());
        Ok(batch)
    }

    /// The writes that move a store from the prior state to `self`, which
    /// must be the prior state with `delta` applied.
    pub fn delta_batch(&self, delta: &StateDelta, digest: &[u8; 32]) -> StoreResult<WriteBatch> {
        let mut batch = WriteBatch::new();
        for (op, utxo) in &delta.utxos {
            batch.put_record(keys::utxo(op), utxo)?;
        }
        for (id, token) in &delta.tokens {
            batch.put_record(keys::token(id), token)?;
        }
        for (id, offer) in &delta.offers {
            batch.put_record(keys::offer(id), offer)?;
        }
        for (id, pool) in &delta.pools {
            batch.put_record(keys::pool(id), pool)?;
        }
        for (address, record) in &delta.validators {
            batch.put_record(keys::validator(address), record)?;
        }
        batch.put(keys::META_HEIGHT.to_vec(), self.height.to_be_bytes().to_vec());
        batch.put_record(keys::META_FEES.to_vec(), &self.fees_burned)?;
        batch.put(keys::META_DIGEST.to_vec(), digest.to_vec());
        Ok(batch)
    }

    /// Rebuild a state and its indexes from a store. `None` if the store
    /// has never been initialised.
    pub fn load<S: KvStore + ?Sized>(store: &S) -> StoreResult<Option<Self>> {
        let height = match store.get(keys::META_HEIGHT)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| StoreError::Corrupt {
                    key: "m/height".into(),
                    reason: "expected 8 bytes".into(),
                })?;
                u64::from_be_bytes(raw)
            }
            None => return Ok(None),
        };

        let mut delta = StateDelta::default();
        for (key, value) in scan_family(store, keys::UTXO_PREFIX)? {
            let utxo: Utxo = storage::decode(&key, &value)?;
            delta.utxos.insert(utxo.out_point, utxo);
        }
        for (key, value) in scan_family(store, keys::TOKEN_PREFIX)? {
            let token: TokenInfo = storage::decode(&key, &value)?;
            delta.tokens.insert(token.token_id, token);
        }
        for (key, value) in scan_family(store, keys::OFFER_PREFIX)? {
            let offer: SwapOffer = storage::decode(&key, &value)?;
            delta.offers.insert(offer.offer_id, offer);
        }
        for (key, value) in scan_family(store, keys::POOL_PREFIX)? {
            let pool: Pool = storage::decode(&key, &value)?;
            delta.pools.insert(pool.pool_id, pool);
        }
        for (key, value) in scan_family(store, keys::VALIDATOR_PREFIX)? {
            let record: ValidatorRecord = storage::decode(&key, &value)?;
            delta.validators.insert(record.address, record);
        }
        if let Some(bytes) = store.get(keys::META_FEES)? {
            delta.fees = storage::decode(keys::META_FEES, &bytes)?;
        }

        let mut state = LedgerState::default();
        state.apply(&delta, height);
        Ok(Some(state))
    }

    /// The digest recorded alongside the state, if any.
    pub fn stored_digest<S: KvStore + ?Sized>(store: &S) -> StoreResult<Option<[u8; 32]>> {
        match store.get(keys::META_DIGEST)? {
            Some(bytes) => {
                let digest = bytes.as_slice().try_into().map_err(|_| StoreError::Corrupt {
                    key: "m/digest".into(),
                    reason: "expected 32 bytes".into(),
                })?;
                Ok(Some(digest))
            }
            None => Ok(None),
        }
    }
}

fn scan_family<S: KvStore + ?Sized>(store: &S, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
    store.scan(prefix, &keys::prefix_end(prefix))
}

impl StateView for LedgerState {
    fn height(&self) -> u64 {
        self.height
    }

    fn utxo(&self, out_point: &OutPoint) -> Option<Utxo> {
        self.utxos.get(out_point).cloned()
    }

    fn unspent_by_owner(&self, owner: &Address, token: Option<&TokenId>) -> Vec<Utxo> {
        self.unspent_iter(owner)
            .filter(|u| token.map_or(true, |t| u.token_id() == t))
            .cloned()
            .collect()
    }

    fn token(&self, token_id: &TokenId) -> Option<TokenInfo> {
        self.tokens.get(token_id).cloned()
    }

    fn active_token_by_ticker(&self, ticker: &str) -> Option<TokenInfo> {
        self.tickers
            .get(&ticker.to_ascii_uppercase())
            .and_then(|id| self.tokens.get(id))
            .cloned()
    }

    fn offer(&self, offer_id: &OfferId) -> Option<SwapOffer> {
        self.offers.get(offer_id).cloned()
    }

    fn pool(&self, pool_id: &PoolId) -> Option<Pool> {
        self.pools.get(pool_id).cloned()
    }

    fn pool_for_pair(&self, a: &TokenId, b: &TokenId) -> Option<Pool> {
        self.pairs
            .get(&ordered_pair(*a, *b))
            .and_then(|id| self.pools.get(id))
            .cloned()
    }

    fn validator(&self, address: &Address) -> Option<ValidatorRecord> {
        self.validators.get(address).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::derive;
    use crate::storage::MemoryStore;
    use crate::transaction::{TokenType, TxId, TxOutput};

    fn utxo(tag: u8, owner: &[u8], amount: u64) -> Utxo {
        Utxo {
            out_point: OutPoint::new(TxId([tag; 32]), 0),
            output: TxOutput::native(amount, derive(owner)),
            block_height: 0,
            is_spent: false,
        }
    }

    fn token(tag: u8, ticker: &str, melted: bool) -> TokenInfo {
        TokenInfo {
            token_id: TokenId([tag; 32]),
            ticker: ticker.into(),
            description: String::new(),
            max_mint: 1,
            max_decimals: 0,
            total_supply: 1,
            locked_shadow: 1,
            total_melted: 0,
            creator: derive(b"alice"),
            is_shadow: false,
            fully_melted: melted,
            kind: TokenType::Custom,
            created_at: 0,
        }
    }

    fn populated() -> (LedgerState, StateDelta) {
        let mut delta = StateDelta::default();
        let owners: [(u8, &[u8], u64); 3] = [(1, b"alice", 10), (2, b"bob", 20), (3, b"alice", 30)];
        for (tag, owner, amount) in owners {
            let u = utxo(tag, owner, amount);
            delta.utxos.insert(u.out_point, u);
        }
        delta.tokens.insert(TokenId([9; 32]), token(9, "ABC", false));
        delta.fees = 5;
        let mut state = LedgerState::default();
        state.apply(&delta, 1);
        (state, delta)
    }

    #[test]
    fn balances_and_listing() {
        let (state, _) = populated();
        assert_eq!(state.balance(&derive(b"alice"), &TokenId::NATIVE), 40);
        assert_eq!(state.balance(&derive(b"carol"), &TokenId::NATIVE), 0);
        let listed = state.list_utxos(&derive(b"alice"), None);
        assert_eq!(listed.len(), 2);
        assert!(listed[0].out_point < listed[1].out_point);
    }

    #[test]
    fn spent_outputs_leave_the_owner_index_but_stay_recorded() {
        let (mut state, _) = populated();
        let mut spend = StateDelta::default();
        let mut u = state.utxo(&OutPoint::new(TxId([1; 32]), 0)).unwrap();
        u.is_spent = true;
        spend.utxos.insert(u.out_point, u.clone());
        state.apply(&spend, 2);

        assert_eq!(state.balance(&derive(b"alice"), &TokenId::NATIVE), 30);
        assert!(state.utxo(&u.out_point).unwrap().is_spent);
        assert_eq!(state.unspent_count(), 2);
    }

    #[test]
    fn ticker_is_freed_by_full_melt() {
        let (mut state, _) = populated();
        assert!(state.active_token_by_ticker("abc").is_some());
        let mut melt = StateDelta::default();
        melt.tokens.insert(TokenId([9; 32]), token(9, "ABC", true));
        state.apply(&melt, 2);
        assert!(state.active_token_by_ticker("ABC").is_none());
        assert!(state.token(&TokenId([9; 32])).is_some());
    }

    #[test]
    fn digest_ignores_how_the_state_was_built() {
        let (state, delta) = populated();

        // Same records, applied across two steps instead of one.
        let mut first = delta.clone();
        let mut second = StateDelta::default();
        let (op, u) = first.utxos.pop_last().unwrap();
        second.utxos.insert(op, u);
        let mut other = LedgerState::default();
        other.apply(&first, 0);
        other.apply(&second, 1);
        assert_eq!(state.digest().unwrap(), other.digest().unwrap());

        let mut later = state.clone();
        later.apply(&StateDelta::default(), 2);
        assert_ne!(state.digest().unwrap(), later.digest().unwrap());
    }

    #[test]
    fn store_round_trip_reproduces_digest() {
        let (state, _) = populated();
        let store = MemoryStore::new();
        store.commit(state.to_batch().unwrap()).unwrap();

        let loaded = LedgerState::load(&store).unwrap().expect("initialised");
        assert_eq!(loaded, state);
        assert_eq!(
            LedgerState::stored_digest(&store).unwrap(),
            Some(state.digest().unwrap())
        );
    }

    #[test]
    fn empty_store_loads_nothing() {
        assert!(LedgerState::load(&MemoryStore::new()).unwrap().is_none());
    }
}
