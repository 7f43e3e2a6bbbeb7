// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Shadow Ledger — Core Library
//!
//! A UTXO ledger with native custom tokens, peer-to-peer swap offers and
//! constant-product liquidity pools. State transitions are deterministic:
//! any two nodes applying the same ordered blocks reach the same state and
//! the same digest.
//!
//! ## Architecture
//!
//! The crate is split along the path a transaction takes:
//!
//! - **config** — Protocol constants and the economic [`LedgerConfig`].
//! - **crypto** — Hashes, Ed25519 keys, and the pluggable signature scheme.
//! - **address** — Address derivation and the checksummed text encoding.
//! - **transaction** — Transaction types, canonical bytes, signing, and
//!   stateless validation.
//! - **state** — Ledger records, read views, staged writes, and the
//!   committed snapshot with its digest.
//! - **engine** — The executor: one transaction in, one state delta out.
//! - **mempool** — Admission with provisional reservation of inputs.
//! - **block** — Genesis and pure block application.
//! - **storage** — The key-value store contract with sled and in-memory
//!   backends.
//! - **ledger** — The context that owns the store, the snapshot, and the
//!   mempool.
//!
//! ## Design Philosophy
//!
//! 1. Value moves in exactly one place (the executor), and every token is
//!    conserved there.
//! 2. Failures are values. Nothing is partially applied.
//! 3. No global state: everything is passed in.

pub mod address;
pub mod block;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod mempool;
pub mod state;
pub mod storage;
pub mod transaction;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use ledger::{BlockSummary, Ledger, LedgerStatus};
