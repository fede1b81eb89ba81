//! Swap planning for rebalancing and bonus conversion.

use crate::error::EngineResult;
use crate::twap_guard::GuardedPrice;
use compoundor_domain::math::concentrated_liquidity::{RangePosition, amount1_per_amount0_x96};
use compoundor_domain::math::tick_math::{
    clamp_tick, price_x96_at_tick, quote_token0_in_token1, quote_token1_in_token0,
    sqrt_ratio_at_tick,
};
use compoundor_domain::math::{Q96, Rounding, mul_div};
use compoundor_domain::position::{FEE_DENOMINATOR, PositionInfo, TickRange};
use compoundor_domain::{DomainError, TokenAmount, TokenId};
use primitive_types::U256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    ZeroForOne,
    OneForZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPlan {
    pub direction: SwapDirection,
    pub amount_in: TokenAmount,
}

impl SwapPlan {
    pub fn token_in(&self, info: &PositionInfo) -> TokenId {
        match self.direction {
            SwapDirection::ZeroForOne => info.token0,
            SwapDirection::OneForZero => info.token1,
        }
    }

    pub fn token_out(&self, info: &PositionInfo) -> TokenId {
        match self.direction {
            SwapDirection::ZeroForOne => info.token1,
            SwapDirection::OneForZero => info.token0,
        }
    }
}

fn plan(direction: SwapDirection, amount_in: U256) -> Option<SwapPlan> {
    if amount_in.is_zero() {
        return None;
    }
    Some(SwapPlan {
        direction,
        amount_in: TokenAmount(amount_in),
    })
}

/// Swap that brings `(amount0, amount1)` to the ratio `range` needs at `tick`.
///
/// Out of range the whole balance of the unused token is swapped. Inside the
/// range the surplus side is swapped so that both sides end up in the ratio
/// the range requires, pool fees ignored.
pub fn plan_rebalance(
    range: TickRange,
    tick: i32,
    amount0: TokenAmount,
    amount1: TokenAmount,
) -> EngineResult<Option<SwapPlan>> {
    match range.position_of(tick) {
        RangePosition::Below => Ok(plan(SwapDirection::OneForZero, amount1.0)),
        RangePosition::Above => Ok(plan(SwapDirection::ZeroForOne, amount0.0)),
        RangePosition::Within => {
            let price = price_x96_at_tick(tick)?;
            let ratio = amount1_per_amount0_x96(
                sqrt_ratio_at_tick(tick)?,
                sqrt_ratio_at_tick(range.lower)?,
                sqrt_ratio_at_tick(range.upper)?,
            )?;

            // Total value in token1, then the token0 share that matches the ratio.
            let value1 = mul_div(amount0.0, price, Q96, Rounding::Down)?
                .checked_add(amount1.0)
                .ok_or(DomainError::MathOverflow)?;
            let denominator = price.checked_add(ratio).ok_or(DomainError::MathOverflow)?;
            let target0 = mul_div(value1, Q96, denominator, Rounding::Down)?;

            if amount0.0 > target0 {
                return Ok(plan(SwapDirection::ZeroForOne, amount0.0 - target0));
            }
            let target1 = mul_div(target0, ratio, Q96, Rounding::Down)?;
            Ok(plan(
                SwapDirection::OneForZero,
                amount1.0.saturating_sub(target1),
            ))
        }
    }
}

/// Minimum acceptable output for a swap priced off a guarded tick.
///
/// The time-weighted tick is moved `max_tick_difference` ticks against the
/// trader and the pool fee is deducted, so any spot price that passed the
/// guard clears this bound.
pub fn min_amount_out(
    direction: SwapDirection,
    amount_in: TokenAmount,
    price: &GuardedPrice,
    fee: u32,
) -> EngineResult<TokenAmount> {
    let after_fee = mul_div(
        amount_in.0,
        U256::from(FEE_DENOMINATOR.saturating_sub(fee)),
        U256::from(FEE_DENOMINATOR),
        Rounding::Down,
    )?;
    let shift = i64::from(price.max_tick_difference);
    let twap = i64::from(price.twap_tick);

    let out = match direction {
        SwapDirection::ZeroForOne => quote_token0_in_token1(after_fee, clamp_tick(twap - shift))?,
        SwapDirection::OneForZero => quote_token1_in_token0(after_fee, clamp_tick(twap + shift))?,
    };
    Ok(TokenAmount(out))
}
