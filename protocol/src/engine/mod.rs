//! # Transaction Executor
//!
//! [`apply_transaction`] turns one transaction into a [`StateDelta`] against
//! a read-only [`StateView`]. It is the single place where value moves.
//!
//! ## Order of operations
//!
//! ```text
//! 1. validate_structure, validate_signatures, validate_lock_time
//! 2. resolve user inputs: exists, unspent, owned by a signer → spend
//! 3. type engine (tokens / swap / pool / validators)
//! 4. user outputs → new UTXOs at (tx id, i)
//! 5. per-token conservation, native surplus burned as fee
//! ```
//!
//! ## Accounting
//!
//! Every movement is recorded per token as inflow or outflow:
//!
//! | Inflow                               | Outflow                               |
//! |--------------------------------------|---------------------------------------|
//! | user inputs                          | user outputs                          |
//! | inputs the engine spends (escrows)   | outputs the engine creates            |
//! | value the ledger releases or creates | value the ledger takes in or destroys |
//!
//! A non-native token must balance exactly. The native token may leave a
//! surplus, which is the fee; it must reach `min_fee` (coinbase excepted).
//!
//! Engine-created outputs take indexes after the user outputs, so every
//! outpoint of a transaction is known once it applies.

mod pool;
mod swap;
mod tokens;
mod validators;

use std::collections::BTreeMap;

use tracing::trace;

use crate::address::Address;
use crate::config::LedgerConfig;
use crate::crypto::SignatureScheme;
use crate::error::{LedgerError, LedgerResult};
use crate::state::{Stage, StateDelta, StateView, TokenInfo, Utxo};
use crate::transaction::{
    validate_input_owner, validate_lock_time, validate_signatures, validate_structure, OutPoint,
    TokenId, Transaction, TxId, TxOutput, TxType, ValidationError,
};

pub use pool::{isqrt, swap_output};

/// Everything execution needs besides the transaction and the state.
#[derive(Clone, Copy)]
pub struct ExecContext<'a> {
    pub config: &'a LedgerConfig,
    pub scheme: &'a dyn SignatureScheme,
}

/// Apply `tx` on top of `view`, whose height is the height being applied.
///
/// Returns the delta on success. On any error nothing is returned, so
/// nothing can have been partially applied.
pub fn apply_transaction<V: StateView + ?Sized>(
    tx: &Transaction,
    view: &V,
    ctx: &ExecContext<'_>,
) -> LedgerResult<StateDelta> {
    validate_structure(tx)?;
    validate_signatures(tx, ctx.scheme)?;
    validate_lock_time(tx, view.height())?;

    let mut scope = TxScope::new(tx, view, ctx.config)?;
    scope.spend_user_inputs()?;

    match tx.tx_type {
        TxType::Coinbase => tokens::coinbase(&mut scope)?,
        TxType::Send => {}
        TxType::MintToken => tokens::mint(&mut scope)?,
        TxType::Melt => tokens::melt(&mut scope)?,
        TxType::RegisterValidator => validators::register(&mut scope)?,
        TxType::Offer => swap::offer(&mut scope)?,
        TxType::AcceptOffer => swap::accept(&mut scope)?,
        TxType::CancelOffer => swap::cancel(&mut scope)?,
        TxType::CreatePool => pool::create(&mut scope)?,
        TxType::AddLiquidity => pool::add_liquidity(&mut scope)?,
        TxType::RemoveLiquidity => pool::remove_liquidity(&mut scope)?,
        TxType::Swap => pool::swap(&mut scope)?,
    }

    scope.create_user_outputs()?;
    let fee = scope.settle()?;
    trace!(tx_id = %scope.tx_id, tx_type = %tx.tx_type, fee, "transaction executed");
    Ok(scope.stage.into_delta())
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Flows {
    inflow: BTreeMap<TokenId, u128>,
    outflow: BTreeMap<TokenId, u128>,
}

impl Flows {
    fn credit(&mut self, token: TokenId, amount: u64) {
        *self.inflow.entry(token).or_default() += u128::from(amount);
    }

    fn debit(&mut self, token: TokenId, amount: u64) {
        *self.outflow.entry(token).or_default() += u128::from(amount);
    }

    fn inflow(&self, token: &TokenId) -> u128 {
        self.inflow.get(token).copied().unwrap_or(0)
    }

    fn outflow(&self, token: &TokenId) -> u128 {
        self.outflow.get(token).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// TxScope
// ---------------------------------------------------------------------------

/// Execution state of one transaction: its staged writes, its flows, and
/// the next free output index for engine outputs.
pub(crate) struct TxScope<'t, 'v, V: StateView + ?Sized> {
    pub(crate) tx: &'t Transaction,
    pub(crate) tx_id: TxId,
    pub(crate) height: u64,
    pub(crate) config: &'t LedgerConfig,
    pub(crate) stage: Stage<'v, V>,
    signers: Vec<Address>,
    flows: Flows,
    next_index: u32,
}

impl<'t, 'v, V: StateView + ?Sized> TxScope<'t, 'v, V> {
    fn new(tx: &'t Transaction, view: &'v V, config: &'t LedgerConfig) -> LedgerResult<Self> {
        let next_index = u32::try_from(tx.outputs.len()).map_err(|_| LedgerError::Overflow)?;
        Ok(Self {
            tx,
            tx_id: tx.id(),
            height: view.height(),
            config,
            stage: Stage::new(view),
            signers: tx.signer_addresses(),
            flows: Flows::default(),
            next_index,
        })
    }

    /// The paying, creating, or calling address.
    pub(crate) fn signer(&self) -> LedgerResult<Address> {
        self.signers
            .first()
            .copied()
            .ok_or(LedgerError::Validation(ValidationError::MissingSignature))
    }

    fn spend_user_inputs(&mut self) -> LedgerResult<()> {
        for (index, out_point) in self.tx.out_points().enumerate() {
            let utxo = self.resolve(&out_point)?;
            validate_input_owner(index, utxo.owner(), &self.signers)?;
            self.flows.credit(*utxo.token_id(), utxo.amount());
            self.stage.spend(utxo);
        }
        Ok(())
    }

    /// An unspent UTXO, or the reason it cannot be spent.
    pub(crate) fn resolve(&self, out_point: &OutPoint) -> LedgerResult<Utxo> {
        match self.stage.utxo(out_point) {
            None => Err(LedgerError::UtxoNotFound(*out_point)),
            Some(utxo) if utxo.is_spent => Err(LedgerError::UtxoAlreadySpent(*out_point)),
            Some(utxo) => Ok(utxo),
        }
    }

    /// Spend an output on the ledger's own authority (escrow, stake).
    pub(crate) fn spend_engine_input(&mut self, out_point: &OutPoint) -> LedgerResult<Utxo> {
        let utxo = self.resolve(out_point)?;
        self.flows.credit(*utxo.token_id(), utxo.amount());
        self.stage.spend(utxo.clone());
        Ok(utxo)
    }

    /// Value the ledger takes into custody or destroys.
    pub(crate) fn take(&mut self, token: TokenId, amount: u64) {
        self.flows.debit(token, amount);
    }

    /// Value the ledger releases from custody or creates.
    pub(crate) fn give(&mut self, token: TokenId, amount: u64) {
        self.flows.credit(token, amount);
    }

    /// Amount of `token` carried by the user inputs.
    pub(crate) fn input_total(&self, token: &TokenId) -> u128 {
        self.tx
            .inputs
            .iter()
            .filter_map(|input| self.stage.utxo(&input.out_point()))
            .filter(|u| u.token_id() == token)
            .map(|u| u128::from(u.amount()))
            .sum()
    }

    pub(crate) fn token(&self, token_id: &TokenId) -> LedgerResult<TokenInfo> {
        self.stage
            .token(token_id)
            .ok_or(LedgerError::TokenNotFound(*token_id))
    }

    /// Create an engine output of `amount` of `token_id` for `to`.
    pub(crate) fn emit(&mut self, amount: u64, to: Address, token_id: TokenId) -> LedgerResult<OutPoint> {
        let token_type = self.token(&token_id)?.kind;
        let out_point = self.fresh_out_point(self.next_index)?;
        self.next_index = self.next_index.checked_add(1).ok_or(LedgerError::Overflow)?;
        self.flows.debit(token_id, amount);
        self.stage.create_utxo(Utxo {
            out_point,
            output: TxOutput::token(amount, to, token_id, token_type),
            block_height: self.height,
            is_spent: false,
        });
        Ok(out_point)
    }

    /// An outpoint of this transaction that does not exist yet. An existing
    /// one means the same transaction was applied before.
    fn fresh_out_point(&self, index: u32) -> LedgerResult<OutPoint> {
        let out_point = OutPoint::new(self.tx_id, index);
        if self.stage.utxo(&out_point).is_some() {
            return Err(LedgerError::DuplicateTransaction(self.tx_id));
        }
        Ok(out_point)
    }

    /// Release `amount` from custody straight to `to`. Zero is a no-op.
    pub(crate) fn pay(&mut self, amount: u64, to: Address, token_id: TokenId) -> LedgerResult<()> {
        if amount > 0 {
            self.give(token_id, amount);
            self.emit(amount, to, token_id)?;
        }
        Ok(())
    }

    fn create_user_outputs(&mut self) -> LedgerResult<()> {
        let minted = TokenId::from(self.tx_id);
        for (index, output) in self.tx.outputs.iter().enumerate() {
            let mut output = output.clone();
            if self.tx.tx_type == TxType::MintToken {
                output.token_id = minted;
            }
            let token = self.token(&output.token_id)?;
            if token.kind != output.token_type {
                return Err(ValidationError::TokenTypeMismatch(index).into());
            }
            let index = u32::try_from(index).map_err(|_| LedgerError::Overflow)?;
            let out_point = self.fresh_out_point(index)?;
            self.flows.debit(output.token_id, output.amount);
            self.stage.create_utxo(Utxo {
                out_point,
                output,
                block_height: self.height,
                is_spent: false,
            });
        }
        Ok(())
    }

    /// Check conservation for every token touched; burn the native surplus.
    fn settle(&mut self) -> LedgerResult<u128> {
        let mut touched: Vec<TokenId> = self.flows.inflow.keys().copied().collect();
        touched.extend(self.flows.outflow.keys().copied());
        touched.sort();
        touched.dedup();

        for token in touched.iter().filter(|t| !t.is_native()) {
            let inputs = self.flows.inflow(token);
            let outputs = self.flows.outflow(token);
            if inputs < outputs {
                return Err(LedgerError::InsufficientFunds {
                    have: inputs,
                    need: outputs,
                });
            }
            if inputs > outputs {
                return Err(LedgerError::UnbalancedToken {
                    token: *token,
                    inputs,
                    outputs,
                });
            }
        }

        let native = TokenId::NATIVE;
        let have = self.flows.inflow(&native);
        let spent = self.flows.outflow(&native);
        let min_fee = if self.tx.tx_type == TxType::Coinbase {
            0
        } else {
            u128::from(self.config.min_fee)
        };
        if have < spent + min_fee {
            return Err(LedgerError::InsufficientFunds {
                have,
                need: spent + min_fee,
            });
        }
        if self.tx.tx_type == TxType::Coinbase && have != spent {
            return Err(LedgerError::UnbalancedToken {
                token: native,
                inputs: have,
                outputs: spent,
            });
        }

        let fee = have - spent;
        self.stage.burn_fee(fee);
        Ok(fee)
    }
}

/// `u128` intermediate back to an amount.
pub(crate) fn to_amount(value: u128) -> LedgerResult<u64> {
    u64::try_from(value).map_err(|_| LedgerError::Overflow)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A small genesis and helpers shared by the engine tests.

    use super::*;
    use crate::block::genesis;
    use crate::crypto::{Ed25519Scheme, KeyPair};
    use crate::state::{LedgerState, Overlay};
    use crate::transaction::{sign_transaction, TransactionBuilder};

    pub struct World {
        pub state: LedgerState,
        pub config: LedgerConfig,
        pub alice: KeyPair,
        pub bob: KeyPair,
    }

    pub const ALICE_FUNDS: u64 = 2_000_000_000_000;
    pub const BOB_FUNDS: u64 = 1_000_000_000;

    impl World {
        pub fn new() -> Self {
            let alice = KeyPair::from_seed(&[1; 32]);
            let bob = KeyPair::from_seed(&[2; 32]);
            let state = genesis(&[(alice.address(), ALICE_FUNDS), (bob.address(), BOB_FUNDS)])
                .expect("genesis");
            Self {
                state,
                config: LedgerConfig::devnet(),
                alice,
                bob,
            }
        }

        /// Apply at the next height and commit.
        pub fn apply(&mut self, tx: &Transaction) -> LedgerResult<StateDelta> {
            let height = self.state.height() + 1;
            let empty = StateDelta::default();
            let view = Overlay::new(&self.state, &empty).at_height(height);
            let ctx = ExecContext {
                config: &self.config,
                scheme: &Ed25519Scheme,
            };
            let delta = apply_transaction(tx, &view, &ctx)?;
            self.state.apply(&delta, height);
            Ok(delta)
        }

        pub fn native_utxos(&self, owner: &KeyPair) -> Vec<OutPoint> {
            self.state
                .unspent_by_owner(&owner.address(), Some(&TokenId::NATIVE))
                .into_iter()
                .map(|u| u.out_point)
                .collect()
        }

        pub fn utxos_of(&self, owner: &KeyPair, token: &TokenId) -> Vec<OutPoint> {
            self.state
                .unspent_by_owner(&owner.address(), Some(token))
                .into_iter()
                .map(|u| u.out_point)
                .collect()
        }

        pub fn balance(&self, owner: &KeyPair, token: &TokenId) -> u128 {
            self.state.balance(&owner.address(), token)
        }
    }

    pub fn signed(builder: TransactionBuilder, key: &KeyPair) -> Transaction {
        let mut tx = builder.timestamp(1_700_000_000_000).build();
        sign_transaction(&mut tx, key);
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::transaction::{TokenType, TransactionBuilder};

    #[test]
    fn send_conserves_value() {
        let mut world = World::new();
        let inputs = world.native_utxos(&world.alice);
        let tx = signed(
            TransactionBuilder::new(TxType::Send)
                .inputs(inputs)
                .output(TxOutput::native(1_000, world.bob.address()))
                .output(TxOutput::native(ALICE_FUNDS - 1_000, world.alice.address())),
            &world.alice,
        );
        let delta = world.apply(&tx).unwrap();
        assert_eq!(delta.fees, 0);
        assert_eq!(world.balance(&world.bob, &TokenId::NATIVE), u128::from(BOB_FUNDS) + 1_000);
        assert_eq!(world.balance(&world.alice, &TokenId::NATIVE), u128::from(ALICE_FUNDS - 1_000));
    }

    #[test]
    fn surplus_is_burned_as_fee() {
        let mut world = World::new();
        world.config.min_fee = 10;
        let inputs = world.native_utxos(&world.bob);
        let tx = signed(
            TransactionBuilder::new(TxType::Send)
                .inputs(inputs)
                .output(TxOutput::native(BOB_FUNDS - 25, world.alice.address())),
            &world.bob,
        );
        assert_eq!(world.apply(&tx).unwrap().fees, 25);
        assert_eq!(world.state.fees_burned(), 25);
    }

    #[test]
    fn fee_below_minimum_rejected() {
        let mut world = World::new();
        world.config.min_fee = 10;
        let inputs = world.native_utxos(&world.bob);
        let tx = signed(
            TransactionBuilder::new(TxType::Send)
                .inputs(inputs)
                .output(TxOutput::native(BOB_FUNDS - 5, world.alice.address())),
            &world.bob,
        );
        assert!(matches!(
            world.apply(&tx),
            Err(LedgerError::InsufficientFunds { have, need })
                if have == u128::from(BOB_FUNDS) && need == u128::from(BOB_FUNDS) + 5
        ));
    }

    #[test]
    fn overspend_rejected() {
        let mut world = World::new();
        let inputs = world.native_utxos(&world.bob);
        let tx = signed(
            TransactionBuilder::new(TxType::Send)
                .inputs(inputs)
                .output(TxOutput::native(BOB_FUNDS + 1, world.alice.address())),
            &world.bob,
        );
        assert!(matches!(world.apply(&tx), Err(LedgerError::InsufficientFunds { .. })));
    }

    #[test]
    fn double_spend_and_unknown_inputs() {
        let mut world = World::new();
        let inputs = world.native_utxos(&world.bob);
        let pay = |world: &World, amount| {
            signed(
                TransactionBuilder::new(TxType::Send)
                    .inputs(inputs.clone())
                    .output(TxOutput::native(amount, world.alice.address())),
                &world.bob,
            )
        };
        let first = pay(&world, BOB_FUNDS);
        let second = pay(&world, BOB_FUNDS - 1);
        world.apply(&first).unwrap();
        assert!(matches!(world.apply(&second), Err(LedgerError::UtxoAlreadySpent(_))));

        let ghost = signed(
            TransactionBuilder::new(TxType::Send)
                .input(OutPoint::new(TxId([0xAB; 32]), 0))
                .output(TxOutput::native(1, world.alice.address())),
            &world.bob,
        );
        assert!(matches!(world.apply(&ghost), Err(LedgerError::UtxoNotFound(_))));
    }

    #[test]
    fn spending_someone_elses_output_rejected() {
        let mut world = World::new();
        let inputs = world.native_utxos(&world.alice);
        let tx = signed(
            TransactionBuilder::new(TxType::Send)
                .inputs(inputs)
                .output(TxOutput::native(1, world.bob.address())),
            &world.bob,
        );
        assert!(matches!(
            world.apply(&tx),
            Err(LedgerError::Validation(ValidationError::OwnerMismatch(0)))
        ));
    }

    #[test]
    fn failed_transaction_leaves_state_untouched() {
        let mut world = World::new();
        let before = world.state.clone();
        let inputs = world.native_utxos(&world.bob);
        let tx = signed(
            TransactionBuilder::new(TxType::Send)
                .inputs(inputs)
                .output(TxOutput::native(BOB_FUNDS * 2, world.alice.address())),
            &world.bob,
        );
        assert!(world.apply(&tx).is_err());
        assert_eq!(world.state, before);
    }

    #[test]
    fn unknown_output_token_rejected() {
        let mut world = World::new();
        let inputs = world.native_utxos(&world.bob);
        let tx = signed(
            TransactionBuilder::new(TxType::Send)
                .inputs(inputs)
                .output(TxOutput::native(BOB_FUNDS, world.alice.address()))
                .output(TxOutput::token(
                    5,
                    world.alice.address(),
                    TokenId([7; 32]),
                    TokenType::Custom,
                )),
            &world.bob,
        );
        assert!(matches!(world.apply(&tx), Err(LedgerError::TokenNotFound(_))));
    }

    #[test]
    fn lock_time_is_checked_against_applied_height() {
        let mut world = World::new();
        let inputs = world.native_utxos(&world.bob);
        let tx = signed(
            TransactionBuilder::new(TxType::Send)
                .lock_time(5)
                .inputs(inputs)
                .output(TxOutput::native(BOB_FUNDS, world.alice.address())),
            &world.bob,
        );
        assert!(matches!(
            world.apply(&tx),
            Err(LedgerError::Validation(ValidationError::LockTime { .. }))
        ));
    }
}
