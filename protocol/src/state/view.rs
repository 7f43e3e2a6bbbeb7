//! Read views and staged writes.
//!
//! Engines never touch committed state. They read through a [`StateView`]
//! and write into a [`Stage`], whose [`StateDelta`] is either handed back
//! on success or dropped on failure. A transaction is therefore applied in
//! full or not at all.
//!
//! ```text
//!   LedgerState ──► Overlay(pending mempool delta) ──► Stage(tx delta)
//!     committed        provisional reservations         this transaction
//! ```
//!
//! Views return owned clones so no borrow of the underlying maps outlives
//! a call.

use std::collections::BTreeMap;

use crate::address::Address;
use crate::transaction::{OfferId, OutPoint, PoolId, TokenId};

use super::records::{ordered_pair, Pool, SwapOffer, TokenInfo, Utxo, ValidatorRecord};

/// Read access to ledger state.
pub trait StateView {
    /// Height of the last applied block, or of the block being applied.
    fn height(&self) -> u64;

    /// The UTXO at `out_point`, spent or not.
    fn utxo(&self, out_point: &OutPoint) -> Option<Utxo>;

    /// Unspent outputs owned by `owner`, optionally of one token, sorted by
    /// outpoint.
    fn unspent_by_owner(&self, owner: &Address, token: Option<&TokenId>) -> Vec<Utxo>;

    fn token(&self, token_id: &TokenId) -> Option<TokenInfo>;

    /// The active (not fully melted) token holding `ticker`. Tickers compare
    /// case-insensitively.
    fn active_token_by_ticker(&self, ticker: &str) -> Option<TokenInfo>;

    fn offer(&self, offer_id: &OfferId) -> Option<SwapOffer>;

    fn pool(&self, pool_id: &PoolId) -> Option<Pool>;

    /// The pool for an unordered token pair.
    fn pool_for_pair(&self, a: &TokenId, b: &TokenId) -> Option<Pool>;

    fn validator(&self, address: &Address) -> Option<ValidatorRecord>;
}

// ---------------------------------------------------------------------------
// StateDelta
// ---------------------------------------------------------------------------

/// Records written by one or more transactions, keyed like the committed
/// maps. Later writes to the same key replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub utxos: BTreeMap<OutPoint, Utxo>,
    pub tokens: BTreeMap<TokenId, TokenInfo>,
    pub offers: BTreeMap<OfferId, SwapOffer>,
    pub pools: BTreeMap<PoolId, Pool>,
    pub validators: BTreeMap<Address, ValidatorRecord>,
    /// Native fees burned.
    pub fees: u128,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
            && self.tokens.is_empty()
            && self.offers.is_empty()
            && self.pools.is_empty()
            && self.validators.is_empty()
            && self.fees == 0
    }

    /// Fold a later delta into this one.
    pub fn merge(&mut self, later: StateDelta) {
        self.utxos.extend(later.utxos);
        self.tokens.extend(later.tokens);
        self.offers.extend(later.offers);
        self.pools.extend(later.pools);
        self.validators.extend(later.validators);
        self.fees = self.fees.saturating_add(later.fees);
    }

    /// Outpoints this delta marks spent.
    pub fn spent(&self) -> impl Iterator<Item = &OutPoint> + '_ {
        self.utxos
            .iter()
            .filter(|(_, utxo)| utxo.is_spent)
            .map(|(out_point, _)| out_point)
    }
}

// ---------------------------------------------------------------------------
// Layered reads
// ---------------------------------------------------------------------------

/// Implements [`StateView`] for a view with `base` and `delta` fields, where
/// staged records shadow the base. `$height` computes the reported height.
macro_rules! layered_view {
    (@record $self:ident, $map:ident, $read:ident, $key:ident) => {
        $self
            .delta
            .$map
            .get($key)
            .cloned()
            .or_else(|| $self.base.$read($key))
    };
    ($view:ident, |$this:ident| $height:expr) => {
        impl<V: StateView + ?Sized> StateView for $view<'_, V> {
            fn height(&self) -> u64 {
                let $this = self;
                $height
            }

            fn utxo(&self, out_point: &OutPoint) -> Option<Utxo> {
                overlay_utxo(self.base, &self.delta, out_point)
            }

            fn unspent_by_owner(&self, owner: &Address, token: Option<&TokenId>) -> Vec<Utxo> {
                overlay_unspent(self.base, &self.delta, owner, token)
            }

            fn token(&self, token_id: &TokenId) -> Option<TokenInfo> {
                layered_view!(@record self, tokens, token, token_id)
            }

            fn active_token_by_ticker(&self, ticker: &str) -> Option<TokenInfo> {
                overlay_ticker(self.base, &self.delta, ticker)
            }

            fn offer(&self, offer_id: &OfferId) -> Option<SwapOffer> {
                layered_view!(@record self, offers, offer, offer_id)
            }

            fn pool(&self, pool_id: &PoolId) -> Option<Pool> {
                layered_view!(@record self, pools, pool, pool_id)
            }

            fn pool_for_pair(&self, a: &TokenId, b: &TokenId) -> Option<Pool> {
                overlay_pair(self.base, &self.delta, a, b)
            }

            fn validator(&self, address: &Address) -> Option<ValidatorRecord> {
                layered_view!(@record self, validators, validator, address)
            }
        }
    };
}

fn overlay_utxo<V: StateView + ?Sized>(
    base: &V,
    delta: &StateDelta,
    out_point: &OutPoint,
) -> Option<Utxo> {
    delta
        .utxos
        .get(out_point)
        .cloned()
        .or_else(|| base.utxo(out_point))
}

fn overlay_unspent<V: StateView + ?Sized>(
    base: &V,
    delta: &StateDelta,
    owner: &Address,
    token: Option<&TokenId>,
) -> Vec<Utxo> {
    let mut merged: BTreeMap<OutPoint, Utxo> = base
        .unspent_by_owner(owner, token)
        .into_iter()
        .map(|utxo| (utxo.out_point, utxo))
        .collect();

    for (out_point, utxo) in &delta.utxos {
        if utxo.owner() != owner || token.is_some_and(|t| t != utxo.token_id()) {
            continue;
        }
        if utxo.is_spent {
            merged.remove(out_point);
        } else {
            merged.insert(*out_point, utxo.clone());
        }
    }
    merged.into_values().collect()
}

fn overlay_ticker<V: StateView + ?Sized>(
    base: &V,
    delta: &StateDelta,
    ticker: &str,
) -> Option<TokenInfo> {
    let staged = delta
        .tokens
        .values()
        .find(|t| t.holds_ticker() && t.ticker.eq_ignore_ascii_case(ticker));
    if let Some(token) = staged {
        return Some(token.clone());
    }
    // A staged update may have fully melted the base's holder.
    let held = base.active_token_by_ticker(ticker)?;
    match delta.tokens.get(&held.token_id) {
        Some(updated) if !updated.holds_ticker() => None,
        Some(updated) => Some(updated.clone()),
        None => Some(held),
    }
}

fn overlay_pair<V: StateView + ?Sized>(
    base: &V,
    delta: &StateDelta,
    a: &TokenId,
    b: &TokenId,
) -> Option<Pool> {
    let pair = ordered_pair(*a, *b);
    if let Some(pool) = delta
        .pools
        .values()
        .find(|p| (p.token_a, p.token_b) == pair)
    {
        return Some(pool.clone());
    }
    let pool = base.pool_for_pair(a, b)?;
    Some(delta.pools.get(&pool.pool_id).cloned().unwrap_or(pool))
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// A base view with a delta layered on top.
pub struct Overlay<'a, V: StateView + ?Sized> {
    base: &'a V,
    delta: &'a StateDelta,
    height: u64,
}

impl<'a, V: StateView + ?Sized> Overlay<'a, V> {
    pub fn new(base: &'a V, delta: &'a StateDelta) -> Self {
        Self {
            base,
            delta,
            height: base.height(),
        }
    }

    /// Report `height` instead of the base height. Used while applying a
    /// block on top of the previous one.
    pub fn at_height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }
}

layered_view!(Overlay, |view| view.height);

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Write staging for one transaction: reads see the base plus everything
/// staged so far.
pub struct Stage<'a, V: StateView + ?Sized> {
    base: &'a V,
    delta: StateDelta,
}

impl<'a, V: StateView + ?Sized> Stage<'a, V> {
    pub fn new(base: &'a V) -> Self {
        Self {
            base,
            delta: StateDelta::default(),
        }
    }

    /// Mark `utxo` spent.
    pub fn spend(&mut self, mut utxo: Utxo) {
        utxo.is_spent = true;
        self.delta.utxos.insert(utxo.out_point, utxo);
    }

    pub fn create_utxo(&mut self, utxo: Utxo) {
        self.delta.utxos.insert(utxo.out_point, utxo);
    }

    pub fn put_token(&mut self, token: TokenInfo) {
        self.delta.tokens.insert(token.token_id, token);
    }

    pub fn put_offer(&mut self, offer: SwapOffer) {
        self.delta.offers.insert(offer.offer_id, offer);
    }

    pub fn put_pool(&mut self, pool: Pool) {
        self.delta.pools.insert(pool.pool_id, pool);
    }

    pub fn put_validator(&mut self, record: ValidatorRecord) {
        self.delta.validators.insert(record.address, record);
    }

    pub fn burn_fee(&mut self, fee: u128) {
        self.delta.fees = self.delta.fees.saturating_add(fee);
    }

    pub fn into_delta(self) -> StateDelta {
        self.delta
    }
}

layered_view!(Stage, |view| view.base.height());
