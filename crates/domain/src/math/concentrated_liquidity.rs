//! Liquidity and token amount conversions for a bounded tick range.
//!
//! All sqrt prices are Q96. Amounts owed to the pool round up, liquidity
//! minted for given amounts rounds down.

use super::fixed_point::{Q96, Rounding, mul_div};
use crate::error::{DomainError, DomainResult};
use primitive_types::U256;

/// Where the current price sits relative to a position's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePosition {
    /// Price below the range: the position holds only token0.
    Below,
    /// Price inside the range: the position holds both tokens.
    Within,
    /// Price at or above the range: the position holds only token1.
    Above,
}

impl RangePosition {
    /// Classifies `tick` against the range, using the sqrt price at the tick.
    ///
    /// At exactly `tick_lower` the price equals the lower bound, so the
    /// position holds only token0.
    pub fn of(tick: i32, tick_lower: i32, tick_upper: i32) -> Self {
        if tick <= tick_lower {
            Self::Below
        } else if tick < tick_upper {
            Self::Within
        } else {
            Self::Above
        }
    }
}

fn ordered(sqrt_a: U256, sqrt_b: U256) -> (U256, U256) {
    if sqrt_a <= sqrt_b {
        (sqrt_a, sqrt_b)
    } else {
        (sqrt_b, sqrt_a)
    }
}

fn to_liquidity(value: U256) -> DomainResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(DomainError::MathOverflow);
    }
    Ok(value.as_u128())
}

/// L = amount0 * (sqrt_a * sqrt_b) / (sqrt_b - sqrt_a)
pub fn liquidity_for_amount0(sqrt_a: U256, sqrt_b: U256, amount0: U256) -> DomainResult<u128> {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    let intermediate = mul_div(lower, upper, Q96, Rounding::Down)?;
    to_liquidity(mul_div(amount0, intermediate, upper - lower, Rounding::Down)?)
}

/// L = amount1 / (sqrt_b - sqrt_a)
pub fn liquidity_for_amount1(sqrt_a: U256, sqrt_b: U256, amount1: U256) -> DomainResult<u128> {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    to_liquidity(mul_div(amount1, Q96, upper - lower, Rounding::Down)?)
}

/// Maximum liquidity that the given amounts can mint at `sqrt_price`.
pub fn liquidity_for_amounts(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    amount0: U256,
    amount1: U256,
) -> DomainResult<u128> {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    if lower == upper {
        return Err(DomainError::DivisionByZero);
    }

    if sqrt_price <= lower {
        liquidity_for_amount0(lower, upper, amount0)
    } else if sqrt_price < upper {
        let l0 = liquidity_for_amount0(sqrt_price, upper, amount0)?;
        let l1 = liquidity_for_amount1(lower, sqrt_price, amount1)?;
        Ok(l0.min(l1))
    } else {
        liquidity_for_amount1(lower, upper, amount1)
    }
}

/// delta_x = L * (sqrt_b - sqrt_a) / (sqrt_a * sqrt_b)
pub fn amount0_for_liquidity(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    rounding: Rounding,
) -> DomainResult<U256> {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    if lower.is_zero() {
        return Err(DomainError::DivisionByZero);
    }
    let numerator = U256::from(liquidity) << 96;
    let scaled = mul_div(numerator, upper - lower, upper, rounding)?;
    mul_div(scaled, U256::one(), lower, rounding)
}

/// delta_y = L * (sqrt_b - sqrt_a)
pub fn amount1_for_liquidity(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    rounding: Rounding,
) -> DomainResult<U256> {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    mul_div(U256::from(liquidity), upper - lower, Q96, rounding)
}

/// Token amounts represented by `liquidity` at `sqrt_price`.
pub fn amounts_for_liquidity(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    rounding: Rounding,
) -> DomainResult<(U256, U256)> {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);

    if sqrt_price <= lower {
        Ok((
            amount0_for_liquidity(lower, upper, liquidity, rounding)?,
            U256::zero(),
        ))
    } else if sqrt_price < upper {
        Ok((
            amount0_for_liquidity(sqrt_price, upper, liquidity, rounding)?,
            amount1_for_liquidity(lower, sqrt_price, liquidity, rounding)?,
        ))
    } else {
        Ok((
            U256::zero(),
            amount1_for_liquidity(lower, upper, liquidity, rounding)?,
        ))
    }
}

/// Ratio `amount1 / amount0` (Q96) that a range requires at an in-range price.
///
/// Callers must only use this while `sqrt_a < sqrt_price < sqrt_b`.
pub fn amount1_per_amount0_x96(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
) -> DomainResult<U256> {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    if sqrt_price <= lower || sqrt_price >= upper {
        return Err(DomainError::DivisionByZero);
    }
    let below = mul_div(sqrt_price - lower, sqrt_price, Q96, Rounding::Down)?;
    mul_div(below, upper, upper - sqrt_price, Rounding::Down)
}
