//! Admission-ordered pool of pending transactions.
//!
//! Admission is check-and-reserve: a transaction is executed against the
//! committed state overlaid with everything admitted before it, and on
//! success its writes join that overlay. Two pending transactions can
//! therefore never spend the same output; the second sees it as spent.
//!
//! ## Design
//!
//! - `DashMap` holds the entries for lock-free lookups (`contains`, `get`,
//!   status queries).
//! - One `parking_lot::Mutex<Pending>` guards the overlay delta and the
//!   admission order. Every admission runs entirely under it, so the
//!   check and the reservation are one step.
//! - After each block the overlay is rebuilt from scratch against the new
//!   committed state, dropping included and invalidated entries.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::engine::{apply_transaction, ExecContext};
use crate::error::LedgerResult;
use crate::state::{Overlay, StateDelta, StateView};
use crate::transaction::{validate_timestamp, Transaction, TxId, TxType};

// ---------------------------------------------------------------------------
// MempoolEntry
// ---------------------------------------------------------------------------

/// A pending transaction together with pool metadata.
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    pub transaction: Transaction,

    /// Unix seconds at admission.
    pub added_at: u64,
}

// ---------------------------------------------------------------------------
// MempoolError
// ---------------------------------------------------------------------------

/// Rejections that come from the pool itself rather than from execution.
#[derive(Debug)]
pub enum MempoolError {
    /// A transaction with the same id is already pending.
    Duplicate(TxId),

    /// The pool is at capacity.
    Full { size: usize },

    /// Coinbase transactions only enter through a block.
    CoinbaseNotAllowed,
}

impl fmt::Display for MempoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(id) => write!(f, "transaction {} is already pending", id),
            Self::Full { size } => write!(f, "mempool is full ({} transactions)", size),
            Self::CoinbaseNotAllowed => write!(f, "coinbase cannot be submitted to the mempool"),
        }
    }
}

impl std::error::Error for MempoolError {}

// ---------------------------------------------------------------------------
// Mempool
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Pending {
    delta: StateDelta,
    order: Vec<TxId>,
}

pub struct Mempool {
    entries: DashMap<TxId, MempoolEntry>,
    pending: Mutex<Pending>,
    max_size: usize,
    expiry_secs: u64,
}

impl fmt::Debug for Mempool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mempool")
            .field("size", &self.entries.len())
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl Mempool {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            entries: DashMap::new(),
            pending: Mutex::new(Pending::default()),
            max_size: config.mempool_max_size,
            expiry_secs: config.mempool_expiry_secs,
        }
    }

    /// Admit `tx` on top of `committed` and everything already pending.
    ///
    /// Checks, in order: coinbase, duplicate, capacity, timestamp window,
    /// then full execution at height `committed + 1`.
    pub fn admit<V: StateView + ?Sized>(
        &self,
        tx: Transaction,
        committed: &V,
        ctx: &ExecContext<'_>,
        now_ms: u64,
    ) -> LedgerResult<TxId> {
        if tx.tx_type == TxType::Coinbase {
            return Err(MempoolError::CoinbaseNotAllowed.into());
        }
        let tx_id = tx.id();

        let mut pending = self.pending.lock();
        if self.entries.contains_key(&tx_id) {
            return Err(MempoolError::Duplicate(tx_id).into());
        }
        if self.entries.len() >= self.max_size {
            return Err(MempoolError::Full {
                size: self.max_size,
            }
            .into());
        }
        validate_timestamp(&tx, now_ms, ctx.config.max_future_ms)?;

        let delta = {
            let view = Overlay::new(committed, &pending.delta).at_height(committed.height() + 1);
            apply_transaction(&tx, &view, ctx)?
        };
        pending.delta.merge(delta);
        pending.order.push(tx_id);
        self.entries.insert(
            tx_id,
            MempoolEntry {
                transaction: tx,
                added_at: now_ms / 1_000,
            },
        );
        debug!(%tx_id, pending = pending.order.len(), "transaction admitted");
        Ok(tx_id)
    }

    /// Up to `max` pending transactions in admission order.
    pub fn select(&self, max: usize) -> Vec<Transaction> {
        let pending = self.pending.lock();
        pending
            .order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| e.transaction.clone()))
            .take(max)
            .collect()
    }

    /// Rebuild the overlay after a block: drop `included`, then re-execute
    /// the rest in admission order against the new `committed` state and
    /// drop whatever no longer applies. Returns how many were invalidated.
    pub fn revalidate<V: StateView + ?Sized>(
        &self,
        committed: &V,
        included: &[TxId],
        ctx: &ExecContext<'_>,
    ) -> usize {
        let mut pending = self.pending.lock();
        for id in included {
            self.entries.remove(id);
        }
        self.rebuild(&mut pending, committed, ctx)
    }

    /// Drop entries older than the configured expiry at `now_secs`, then
    /// rebuild the overlay so their reservations are released. Returns the
    /// number of entries removed, expired or invalidated.
    pub fn expire_old<V: StateView + ?Sized>(
        &self,
        committed: &V,
        ctx: &ExecContext<'_>,
        now_secs: u64,
    ) -> usize {
        let cutoff = now_secs.saturating_sub(self.expiry_secs);
        let mut pending = self.pending.lock();

        // Collect first: never mutate the map while iterating it.
        let expired: Vec<TxId> = self
            .entries
            .iter()
            .filter(|entry| entry.value().added_at < cutoff)
            .map(|entry| *entry.key())
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        if expired.is_empty() {
            return 0;
        }
        debug!(count = expired.len(), "expired pending transactions");
        expired.len() + self.rebuild(&mut pending, committed, ctx)
    }

    fn rebuild<V: StateView + ?Sized>(
        &self,
        pending: &mut Pending,
        committed: &V,
        ctx: &ExecContext<'_>,
    ) -> usize {
        let height = committed.height() + 1;
        let order = std::mem::take(&mut pending.order);
        pending.delta = StateDelta::default();
        let mut dropped = 0;

        for tx_id in order {
            let Some(entry) = self.entries.get(&tx_id).map(|e| e.transaction.clone()) else {
                continue;
            };
            let applied = {
                let view = Overlay::new(committed, &pending.delta).at_height(height);
                apply_transaction(&entry, &view, ctx)
            };
            match applied {
                Ok(delta) => {
                    pending.delta.merge(delta);
                    pending.order.push(tx_id);
                }
                Err(e) => {
                    warn!(%tx_id, error = %e, "evicting pending transaction");
                    self.entries.remove(&tx_id);
                    dropped += 1;
                }
            }
        }
        dropped
    }

    pub fn get(&self, tx_id: &TxId) -> Option<Transaction> {
        self.entries.get(tx_id).map(|e| e.transaction.clone())
    }

    pub fn contains(&self, tx_id: &TxId) -> bool {
        self.entries.contains_key(tx_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        let mut pending = self.pending.lock();
        self.entries.clear();
        *pending = Pending::default();
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
