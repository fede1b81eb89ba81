//! Fixed-point arithmetic over 256-bit integers.
//!
//! Every multiplication that precedes a division goes through a 512-bit
//! intermediate, so `a * b / d` never overflows while the quotient fits.

use crate::error::{DomainError, DomainResult};
use primitive_types::{U256, U512};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 2^64, the scale of X64 fractions.
pub const Q64: U256 = U256([0, 1, 0, 0]);

/// 2^96, the scale of sqrt prices and Q96 prices.
pub const Q96: U256 = U256([0, 1 << 32, 0, 0]);

/// Rounding direction for divisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round toward zero.
    Down,
    /// Round away from zero when a remainder exists.
    Up,
}

/// Computes `a * b / denominator` with a 512-bit intermediate.
pub fn mul_div(a: U256, b: U256, denominator: U256, rounding: Rounding) -> DomainResult<U256> {
    if denominator.is_zero() {
        return Err(DomainError::DivisionByZero);
    }

    let product: U512 = a.full_mul(b);
    let denominator = U512::from(denominator);
    let quotient = product / denominator;
    let remainder = product % denominator;

    let result = U256::try_from(quotient).map_err(|_| DomainError::MathOverflow)?;
    if rounding == Rounding::Up && !remainder.is_zero() {
        return result
            .checked_add(U256::one())
            .ok_or(DomainError::MathOverflow);
    }
    Ok(result)
}

/// A fraction in units of 1/2^64.
///
/// The inner value is always below 2^64, so 100% is not representable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct X64(pub u64);

impl X64 {
    /// The zero fraction.
    pub const ZERO: Self = Self(0);

    /// Builds `numerator / denominator`, rounded down.
    ///
    /// Returns `None` unless `numerator < denominator`.
    pub fn from_ratio(numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 || numerator >= denominator {
            return None;
        }
        let scaled = (u128::from(numerator) << 64) / u128::from(denominator);
        u64::try_from(scaled).ok().map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn as_u256(&self) -> U256 {
        U256::from(self.0)
    }

    /// Applies the fraction to an amount.
    pub fn apply(&self, amount: U256, rounding: Rounding) -> DomainResult<U256> {
        mul_div(amount, self.as_u256(), Q64, rounding)
    }

    /// The fraction as a percentage, for display.
    pub fn to_percent(&self) -> Decimal {
        let scale = Decimal::from(u64::MAX) + Decimal::ONE;
        Decimal::from(self.0) * Decimal::ONE_HUNDRED / scale
    }
}

impl fmt::Display for X64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.to_percent().round_dp(6))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mul_div_rounding() {
        let a = U256::from(10);
        let b = U256::from(3);
        let d = U256::from(4);
        assert_eq!(mul_div(a, b, d, Rounding::Down).unwrap(), U256::from(7));
        assert_eq!(mul_div(a, b, d, Rounding::Up).unwrap(), U256::from(8));
        assert_eq!(
            mul_div(U256::from(8), b, d, Rounding::Up).unwrap(),
            U256::from(6)
        );
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // MAX * MAX / MAX only fits through the 512-bit product.
        let r = mul_div(U256::MAX, U256::MAX, U256::MAX, Rounding::Down).unwrap();
        assert_eq!(r, U256::MAX);
        assert_eq!(
            mul_div(U256::MAX, U256::from(2), U256::one(), Rounding::Down),
            Err(DomainError::MathOverflow)
        );
        assert_eq!(
            mul_div(U256::one(), U256::one(), U256::zero(), Rounding::Down),
            Err(DomainError::DivisionByZero)
        );
    }

    #[test]
    fn test_x64_from_ratio() {
        let two_percent = X64::from_ratio(1, 50).unwrap();
        assert_eq!(two_percent.0, u64::MAX / 50);
        assert_eq!(two_percent.to_percent().round_dp(6), dec!(2));
        assert!(X64::from_ratio(1, 1).is_none());
        assert!(X64::from_ratio(1, 0).is_none());
    }
}
