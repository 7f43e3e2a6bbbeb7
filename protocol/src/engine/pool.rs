//! Constant-product liquidity pools.
//!
//! Reserves are ledger-held: deposits leave the transaction as custody
//! outflow and withdrawals come back as inflow, so the executor's
//! conservation check covers pool operations like any other. All products
//! are computed in `u128`.

use super::{to_amount, TxScope};
use crate::address::Address;
use crate::config::{
    BPS_DENOMINATOR, LP_DECIMALS, LP_TICKER_SUFFIX, MAX_MINT, MAX_TOKEN_SUPPLY,
    RATIO_TOLERANCE_PERCENT,
};
use crate::error::{LedgerError, LedgerResult};
use crate::state::{ordered_pair, Pool, StateView, TokenInfo};
use crate::transaction::{
    AddLiquidityParams, CreatePoolParams, PoolId, RemoveLiquidityParams, SwapParams, TokenId,
    TokenType,
};

/// Integer square root, rounded down.
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = 1u128 << ((128 - n.leading_zeros()).div_ceil(2));
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// `in·(10000−fee)·rOut / (rIn·10000 + in·(10000−fee))`, or `None` on
/// overflow.
pub fn swap_output(amount_in: u64, reserve_in: u64, reserve_out: u64, fee_bps: u16) -> Option<u64> {
    let net = u128::from(amount_in).checked_mul(u128::from(BPS_DENOMINATOR - u64::from(fee_bps)))?;
    let numerator = net.checked_mul(u128::from(reserve_out))?;
    let denominator = u128::from(reserve_in)
        .checked_mul(u128::from(BPS_DENOMINATOR))?
        .checked_add(net)?;
    if denominator == 0 {
        return None;
    }
    u64::try_from(numerator / denominator).ok()
}

fn seed_supply(amount_a: u64, amount_b: u64) -> u64 {
    let root = isqrt(u128::from(amount_a) * u128::from(amount_b));
    u64::try_from(root.min(u128::from(MAX_TOKEN_SUPPLY))).unwrap_or(MAX_TOKEN_SUPPLY)
}

fn lp_token<V: StateView + ?Sized>(scope: &TxScope<'_, '_, V>, pool: &Pool) -> LedgerResult<TokenInfo> {
    scope.token(&pool.lp_token_id)
}

fn load_pool<V: StateView + ?Sized>(scope: &TxScope<'_, '_, V>, pool_id: &PoolId) -> LedgerResult<Pool> {
    scope
        .stage
        .pool(pool_id)
        .ok_or(LedgerError::PoolNotFound(*pool_id))
}

/// Mint `amount` of the pool's LP token to `to` and track the supply.
fn mint_lp<V: StateView + ?Sized>(
    scope: &mut TxScope<'_, '_, V>,
    pool: &mut Pool,
    amount: u64,
    to: Address,
) -> LedgerResult<()> {
    pool.lp_supply = pool
        .lp_supply
        .checked_add(amount)
        .filter(|supply| *supply <= MAX_TOKEN_SUPPLY)
        .ok_or(LedgerError::Overflow)?;
    let mut lp = lp_token(scope, pool)?;
    lp.total_supply = pool.lp_supply;
    scope.stage.put_token(lp);
    scope.pay(amount, to, pool.lp_token_id)
}

pub(super) fn create<V: StateView + ?Sized>(scope: &mut TxScope<'_, '_, V>) -> LedgerResult<()> {
    let params: CreatePoolParams = scope.tx.params()?;
    let creator = scope.signer()?;

    let (token_a, token_b) = ordered_pair(params.token_a, params.token_b);
    let (amount_a, amount_b) = if token_a == params.token_a {
        (params.amount_a, params.amount_b)
    } else {
        (params.amount_b, params.amount_a)
    };
    let info_a = scope.token(&token_a)?;
    let info_b = scope.token(&token_b)?;
    for info in [&info_a, &info_b] {
        if info.kind == TokenType::Lp {
            return Err(LedgerError::UnsupportedToken(info.token_id));
        }
    }
    if scope.stage.pool_for_pair(&token_a, &token_b).is_some() {
        return Err(LedgerError::PoolAlreadyExists(token_a, token_b));
    }

    scope.take(token_a, amount_a);
    scope.take(token_b, amount_b);

    let pool_id = scope.tx_id;
    let lp_token_id = TokenId::from(pool_id);
    scope.stage.put_token(TokenInfo {
        token_id: lp_token_id,
        ticker: format!("{}{}{}", info_a.ticker, info_b.ticker, LP_TICKER_SUFFIX),
        description: format!("{}/{} liquidity", info_a.ticker, info_b.ticker),
        max_mint: MAX_MINT,
        max_decimals: LP_DECIMALS,
        total_supply: 0,
        locked_shadow: 0,
        total_melted: 0,
        creator,
        is_shadow: false,
        fully_melted: false,
        kind: TokenType::Lp,
        created_at: scope.height,
    });

    let mut pool = Pool {
        pool_id,
        token_a,
        token_b,
        reserve_a: amount_a,
        reserve_b: amount_b,
        lp_token_id,
        lp_supply: 0,
        fee_basis_points: params.fee_basis_points,
        creator,
        created_at: scope.height,
    };
    let minted = seed_supply(amount_a, amount_b);
    mint_lp(scope, &mut pool, minted, creator)?;
    scope.stage.put_pool(pool);
    Ok(())
}

pub(super) fn add_liquidity<V: StateView + ?Sized>(
    scope: &mut TxScope<'_, '_, V>,
) -> LedgerResult<()> {
    let params: AddLiquidityParams = scope.tx.params()?;
    let provider = scope.signer()?;
    let mut pool = load_pool(scope, &params.pool_id)?;

    let (a, b) = (u128::from(params.amount_a), u128::from(params.amount_b));
    let (ra, rb) = (u128::from(pool.reserve_a), u128::from(pool.reserve_b));
    let supply = u128::from(pool.lp_supply);

    let minted = if ra == 0 || rb == 0 || supply == 0 {
        // Drained: any ratio re-seeds the pool.
        u128::from(seed_supply(params.amount_a, params.amount_b))
    } else {
        let deviation = (a * rb).abs_diff(b * ra);
        let scaled = deviation
            .checked_mul(100)
            .ok_or(LedgerError::Overflow)?;
        if scaled > b * ra * RATIO_TOLERANCE_PERCENT {
            return Err(LedgerError::RatioMismatch);
        }
        (a * supply / ra).min(b * supply / rb)
    };
    let minted = to_amount(minted)?;
    if minted == 0 {
        return Err(LedgerError::InsufficientLiquidity);
    }
    if minted < params.min_lp_out {
        return Err(LedgerError::SlippageExceeded {
            actual: minted,
            minimum: params.min_lp_out,
        });
    }

    scope.take(pool.token_a, params.amount_a);
    scope.take(pool.token_b, params.amount_b);
    pool.reserve_a = pool
        .reserve_a
        .checked_add(params.amount_a)
        .ok_or(LedgerError::Overflow)?;
    pool.reserve_b = pool
        .reserve_b
        .checked_add(params.amount_b)
        .ok_or(LedgerError::Overflow)?;
    mint_lp(scope, &mut pool, minted, provider)?;
    scope.stage.put_pool(pool);
    Ok(())
}

pub(super) fn remove_liquidity<V: StateView + ?Sized>(
    scope: &mut TxScope<'_, '_, V>,
) -> LedgerResult<()> {
    let params: RemoveLiquidityParams = scope.tx.params()?;
    let provider = scope.signer()?;
    let mut pool = load_pool(scope, &params.pool_id)?;
    if pool.lp_supply == 0 || params.lp_amount > pool.lp_supply {
        return Err(LedgerError::InsufficientLiquidity);
    }

    let lp = u128::from(params.lp_amount);
    let supply = u128::from(pool.lp_supply);
    let out_a = to_amount(lp * u128::from(pool.reserve_a) / supply)?;
    let out_b = to_amount(lp * u128::from(pool.reserve_b) / supply)?;
    if out_a < params.min_amount_a {
        return Err(LedgerError::SlippageExceeded {
            actual: out_a,
            minimum: params.min_amount_a,
        });
    }
    if out_b < params.min_amount_b {
        return Err(LedgerError::SlippageExceeded {
            actual: out_b,
            minimum: params.min_amount_b,
        });
    }
    if out_a == 0 && out_b == 0 {
        return Err(LedgerError::InsufficientLiquidity);
    }

    scope.take(pool.lp_token_id, params.lp_amount);
    pool.lp_supply -= params.lp_amount;
    pool.reserve_a -= out_a;
    pool.reserve_b -= out_b;
    let mut lp_info = lp_token(scope, &pool)?;
    lp_info.total_supply = pool.lp_supply;
    scope.stage.put_token(lp_info);

    scope.pay(out_a, provider, pool.token_a)?;
    scope.pay(out_b, provider, pool.token_b)?;
    scope.stage.put_pool(pool);
    Ok(())
}

pub(super) fn swap<V: StateView + ?Sized>(scope: &mut TxScope<'_, '_, V>) -> LedgerResult<()> {
    let params: SwapParams = scope.tx.params()?;
    let trader = scope.signer()?;
    let mut pool = load_pool(scope, &params.pool_id)?;

    let (reserve_in, reserve_out) = pool
        .reserves_for(&params.token_in)
        .ok_or(LedgerError::UnsupportedToken(params.token_in))?;
    if reserve_in == 0 || reserve_out == 0 {
        return Err(LedgerError::InsufficientLiquidity);
    }
    let out = swap_output(params.amount_in, reserve_in, reserve_out, pool.fee_basis_points)
        .ok_or(LedgerError::Overflow)?;
    if out == 0 {
        return Err(LedgerError::InsufficientLiquidity);
    }
    if out < params.min_amount_out {
        return Err(LedgerError::SlippageExceeded {
            actual: out,
            minimum: params.min_amount_out,
        });
    }

    let new_in = reserve_in
        .checked_add(params.amount_in)
        .ok_or(LedgerError::Overflow)?;
    let new_out = reserve_out - out;
    let token_out = if params.token_in == pool.token_a {
        pool.reserve_a = new_in;
        pool.reserve_b = new_out;
        pool.token_b
    } else {
        pool.reserve_b = new_in;
        pool.reserve_a = new_out;
        pool.token_a
    };

    scope.take(params.token_in, params.amount_in);
    scope.pay(out, trader, token_out)?;
    scope.stage.put_pool(pool);
    Ok(())
}
