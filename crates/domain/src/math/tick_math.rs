//! Conversions between ticks, sqrt prices and prices.
//!
//! Sqrt prices are Q96 values of `sqrt(1.0001^tick)`, bit-compatible with the
//! Uniswap V3 tick math so that engine and keeper agree on every quote.

use super::fixed_point::{Q96, Rounding, mul_div};
use crate::error::{DomainError, DomainResult};
use primitive_types::U256;

/// Minimum supported tick.
pub const MIN_TICK: i32 = -887_272;

/// Maximum supported tick.
pub const MAX_TICK: i32 = 887_272;

/// `2^128 / sqrt(1.0001)^(2^i)` for i in 1..20, in Q128.
const INVERSE_SQRT_POWERS_Q128: [u128; 19] = [
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
    0x48a170391f7dc42444e8fa2,
];

/// Inverse of sqrt(1.0001) in Q128, the factor for bit 0.
const INVERSE_SQRT_BASE_Q128: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;

/// Returns `sqrt(1.0001^tick)` as a Q96 value, rounded up.
pub fn sqrt_ratio_at_tick(tick: i32) -> DomainResult<U256> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(DomainError::InvalidTick(tick));
    }

    let abs_tick = tick.unsigned_abs();
    let mut ratio = if abs_tick & 1 != 0 {
        U256::from(INVERSE_SQRT_BASE_Q128)
    } else {
        U256::one() << 128
    };

    for (bit, factor) in INVERSE_SQRT_POWERS_Q128.iter().enumerate() {
        if abs_tick & (1 << (bit + 1)) != 0 {
            ratio = (ratio * U256::from(*factor)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128 -> Q96, rounding up so the result never understates the price.
    let remainder = ratio % (U256::one() << 32);
    let mut sqrt_price = ratio >> 32;
    if !remainder.is_zero() {
        sqrt_price = sqrt_price + U256::one();
    }
    Ok(sqrt_price)
}

/// Returns the price of token0 in token1 (`1.0001^tick`) as a Q96 value.
pub fn price_x96_at_tick(tick: i32) -> DomainResult<U256> {
    let sqrt_price = sqrt_ratio_at_tick(tick)?;
    mul_div(sqrt_price, sqrt_price, Q96, Rounding::Down)
}

/// Clamps a tick into the supported range.
pub fn clamp_tick(tick: i64) -> i32 {
    tick.clamp(i64::from(MIN_TICK), i64::from(MAX_TICK)) as i32
}

/// Converts an amount of token0 into token1 at `tick`.
pub fn quote_token0_in_token1(amount0: U256, tick: i32) -> DomainResult<U256> {
    let price = price_x96_at_tick(tick)?;
    mul_div(amount0, price, Q96, Rounding::Down)
}

/// Converts an amount of token1 into token0 at `tick`.
pub fn quote_token1_in_token0(amount1: U256, tick: i32) -> DomainResult<U256> {
    let price = price_x96_at_tick(tick)?;
    mul_div(amount1, Q96, price, Rounding::Down)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_ratio_at_zero_is_one() {
        assert_eq!(sqrt_ratio_at_tick(0).unwrap(), Q96);
        assert_eq!(price_x96_at_tick(0).unwrap(), Q96);
    }

    #[test]
    fn test_sqrt_ratio_bounds() {
        // Known Uniswap constants for MIN_SQRT_RATIO and MAX_SQRT_RATIO.
        assert_eq!(
            sqrt_ratio_at_tick(MIN_TICK).unwrap(),
            U256::from(4295128739u64)
        );
        assert_eq!(
            sqrt_ratio_at_tick(MAX_TICK).unwrap(),
            U256::from_dec_str("1461446703485210103287273052203988822378723970342").unwrap()
        );
        assert!(sqrt_ratio_at_tick(MAX_TICK + 1).is_err());
        assert!(sqrt_ratio_at_tick(MIN_TICK - 1).is_err());
    }

    #[test]
    fn test_sqrt_ratio_is_monotonic() {
        let mut previous = sqrt_ratio_at_tick(-1000).unwrap();
        for tick in -999..1000 {
            let current = sqrt_ratio_at_tick(tick).unwrap();
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn test_quotes_are_inverse_at_symmetric_ticks() {
        let amount = U256::from(1_000_000_000u64);
        let forward = quote_token0_in_token1(amount, 6932).unwrap();
        // 1.0001^6932 is roughly 2.
        assert!(forward > U256::from(1_999_000_000u64));
        assert!(forward < U256::from(2_001_000_000u64));

        let back = quote_token1_in_token0(forward, 6932).unwrap();
        assert!(back <= amount);
        assert!(amount - back <= U256::from(2));
    }
}
