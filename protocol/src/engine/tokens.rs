//! Token registry operations: coinbase issuance, mint with collateral, and
//! proportional melt.

use super::{to_amount, TxScope};
use crate::error::{LedgerError, LedgerResult};
use crate::state::{StateView, TokenInfo};
use crate::transaction::{MeltParams, MintParams, TokenId, TokenType};

/// Create new base asset, at most `block_reward` per block.
pub(super) fn coinbase<V: StateView + ?Sized>(scope: &mut TxScope<'_, '_, V>) -> LedgerResult<()> {
    let created: u128 = scope
        .tx
        .outputs
        .iter()
        .filter(|o| o.token_id.is_native())
        .map(|o| u128::from(o.amount))
        .sum();
    let limit = scope.config.block_reward;
    if created > u128::from(limit) {
        return Err(LedgerError::CoinbaseTooLarge {
            amount: created,
            limit,
        });
    }
    let created = to_amount(created)?;

    let mut native = scope.token(&TokenId::NATIVE)?;
    native.total_supply = native
        .total_supply
        .checked_add(created)
        .ok_or(LedgerError::Overflow)?;
    scope.stage.put_token(native);
    scope.give(TokenId::NATIVE, created);
    Ok(())
}

/// Register a custom token and create its whole supply.
///
/// The creator locks `total_supply` base units as collateral, plus
/// `min_fee`, drawn from their native outputs in outpoint order. Excess
/// comes back as change.
pub(super) fn mint<V: StateView + ?Sized>(scope: &mut TxScope<'_, '_, V>) -> LedgerResult<()> {
    let params: MintParams = scope.tx.params()?;
    let creator = scope.signer()?;

    let ticker = params.ticker.to_ascii_uppercase();
    if scope.stage.active_token_by_ticker(&ticker).is_some() {
        return Err(LedgerError::TickerInUse(ticker));
    }

    let supply = params.total_supply().ok_or(LedgerError::Overflow)?;
    let need = supply
        .checked_add(scope.config.min_fee)
        .ok_or(LedgerError::Overflow)?;

    let mut have: u128 = 0;
    let mut stake = Vec::new();
    for utxo in scope.stage.unspent_by_owner(&creator, Some(&TokenId::NATIVE)) {
        if have >= u128::from(need) {
            break;
        }
        have += u128::from(utxo.amount());
        stake.push(utxo.out_point);
    }
    if have < u128::from(need) {
        return Err(LedgerError::InsufficientStake {
            have: to_amount(have)?,
            need,
        });
    }

    for out_point in &stake {
        scope.spend_engine_input(out_point)?;
    }
    scope.take(TokenId::NATIVE, supply);
    let change = to_amount(have - u128::from(need))?;
    if change > 0 {
        scope.emit(change, creator, TokenId::NATIVE)?;
    }

    let token_id = TokenId::from(scope.tx_id);
    scope.stage.put_token(TokenInfo {
        token_id,
        ticker,
        description: params.description,
        max_mint: params.max_mint,
        max_decimals: params.max_decimals,
        total_supply: supply,
        locked_shadow: supply,
        total_melted: 0,
        creator,
        is_shadow: false,
        fully_melted: false,
        kind: TokenType::Custom,
        created_at: scope.height,
    });
    scope.give(token_id, supply);
    Ok(())
}

/// Destroy custom tokens from the inputs and release their share of the
/// collateral to the holder.
pub(super) fn melt<V: StateView + ?Sized>(scope: &mut TxScope<'_, '_, V>) -> LedgerResult<()> {
    let params: MeltParams = scope.tx.params()?;
    let token_id = scope.tx.token_id;
    if token_id.is_native() {
        return Err(LedgerError::CannotMeltBaseToken);
    }
    let mut token = scope.token(&token_id)?;
    if token.is_shadow {
        return Err(LedgerError::CannotMeltBaseToken);
    }
    if token.kind != TokenType::Custom {
        return Err(LedgerError::UnsupportedToken(token_id));
    }
    let holder = scope.signer()?;

    let have = u64::try_from(scope.input_total(&token_id)).unwrap_or(u64::MAX);
    let amount = if params.amount == 0 { have } else { params.amount };
    if amount == 0 || amount > have {
        return Err(LedgerError::InsufficientTokenBalance {
            have,
            need: amount.max(1),
        });
    }

    let unlock = token.unlock_for(amount);
    token.total_melted = token
        .total_melted
        .checked_add(amount)
        .ok_or(LedgerError::Overflow)?;
    token.locked_shadow -= unlock;
    if token.total_melted >= token.total_supply {
        token.fully_melted = true;
    }
    scope.stage.put_token(token);

    scope.take(token_id, amount);
    scope.pay(unlock, holder, TokenId::NATIVE)
}
