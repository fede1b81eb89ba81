use crate::ids::TokenId;
use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Token metadata used for display and unit conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub address: TokenId,
    pub symbol: String,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: TokenId, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// A non-negative raw token amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenAmount(pub U256);

impl TokenAmount {
    pub fn new(amount: impl Into<U256>) -> Self {
        Self(amount.into())
    }

    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Converts to a decimal number of whole tokens.
    ///
    /// Returns `None` when the raw value exceeds the decimal mantissa.
    pub fn to_decimal(&self, decimals: u8) -> Option<Decimal> {
        if self.0 > U256::from(u128::MAX) {
            return None;
        }
        let raw = i128::try_from(self.0.as_u128()).ok()?;
        Decimal::try_from_i128_with_scale(raw, u32::from(decimals)).ok()
    }
}

impl From<u64> for TokenAmount {
    fn from(v: u64) -> Self {
        Self(U256::from(v))
    }
}

impl From<u128> for TokenAmount {
    fn from(v: u128) -> Self {
        Self(U256::from(v))
    }
}

impl From<U256> for TokenAmount {
    fn from(v: U256) -> Self {
        Self(v)
    }
}

impl Add for TokenAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TokenAmount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0 + rhs.0;
    }
}

impl Sub for TokenAmount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for TokenAmount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0 - rhs.0;
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_decimal() {
        let amount = TokenAmount::from(1_500_000u64);
        assert_eq!(amount.to_decimal(6), Some(dec!(1.5)));
        assert_eq!(TokenAmount(U256::MAX).to_decimal(18), None);
    }

    #[test]
    fn test_checked_sub_underflow() {
        let a = TokenAmount::from(5u64);
        let b = TokenAmount::from(7u64);
        assert!(a.checked_sub(b).is_none());
        assert_eq!(a.saturating_sub(b), TokenAmount::zero());
        assert_eq!(b.checked_sub(a), Some(TokenAmount::from(2u64)));
    }
}
