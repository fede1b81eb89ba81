//! Bonus and TWAP parameters consulted by the compounding engine.

use crate::error::{DomainError, DomainResult};
use crate::math::fixed_point::X64;
use serde::{Deserialize, Serialize};

/// Upper bound for both bonus fractions: 2^64 / 20 (5%).
pub const MAX_BONUS_X64: X64 = X64(u64::MAX / 20);

/// Fee-share parameters as X64 fractions of the compounded amounts.
///
/// Invariant: `compounder_bonus_x64 <= total_bonus_x64 <= MAX_BONUS_X64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusParameters {
    /// Combined share of caller bonus and protocol fee.
    pub total_bonus_x64: X64,
    /// Caller's share, carved out of the total.
    pub compounder_bonus_x64: X64,
}

impl BonusParameters {
    /// Validates the static bounds of a parameter pair.
    pub fn new(total_bonus_x64: X64, compounder_bonus_x64: X64) -> DomainResult<Self> {
        if total_bonus_x64 > MAX_BONUS_X64 {
            return Err(DomainError::InvalidBonus("total bonus above maximum"));
        }
        if compounder_bonus_x64 > MAX_BONUS_X64 {
            return Err(DomainError::InvalidBonus("compounder bonus above maximum"));
        }
        if compounder_bonus_x64 > total_bonus_x64 {
            return Err(DomainError::InvalidBonus("compounder bonus above total bonus"));
        }
        Ok(Self {
            total_bonus_x64,
            compounder_bonus_x64,
        })
    }

    /// Validates a replacement against the current parameters.
    ///
    /// The total bonus may only ratchet down; the compounder share may move
    /// freely below the total.
    pub fn validate_update(&self, next: &BonusParameters) -> DomainResult<()> {
        let checked = Self::new(next.total_bonus_x64, next.compounder_bonus_x64)?;
        if checked.total_bonus_x64 > self.total_bonus_x64 {
            return Err(DomainError::InvalidBonus("total bonus can only decrease"));
        }
        Ok(())
    }

    /// Protocol share, `total - compounder`.
    pub fn protocol_bonus_x64(&self) -> X64 {
        X64(self.total_bonus_x64.0 - self.compounder_bonus_x64.0)
    }
}

impl Default for BonusParameters {
    fn default() -> Self {
        Self {
            total_bonus_x64: X64(u64::MAX / 50),      // 2%
            compounder_bonus_x64: X64(u64::MAX / 100), // 1%
        }
    }
}

/// Price manipulation guard settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapParameters {
    /// Largest accepted distance between spot and time-weighted tick.
    pub max_tick_difference: u32,
    /// Averaging window in seconds, at least 1.
    pub window_seconds: u32,
}

impl TwapParameters {
    pub fn new(max_tick_difference: u32, window_seconds: u32) -> DomainResult<Self> {
        if window_seconds == 0 {
            return Err(DomainError::InvalidTwapConfig("window must be at least one second"));
        }
        Ok(Self {
            max_tick_difference,
            window_seconds,
        })
    }
}

impl Default for TwapParameters {
    fn default() -> Self {
        Self {
            max_tick_difference: 100,
            window_seconds: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bonus_bounds() {
        assert!(BonusParameters::new(MAX_BONUS_X64, MAX_BONUS_X64).is_ok());
        assert!(BonusParameters::new(X64(MAX_BONUS_X64.0 + 1), X64::ZERO).is_err());
        assert!(BonusParameters::new(X64(10), X64(11)).is_err());
        assert!(BonusParameters::new(X64::ZERO, X64::ZERO).is_ok());
    }

    #[test]
    fn test_total_bonus_ratchets_down() {
        let current = BonusParameters::default();
        let raised = BonusParameters {
            total_bonus_x64: X64(current.total_bonus_x64.0 + 1),
            ..current
        };
        assert_eq!(
            current.validate_update(&raised),
            Err(DomainError::InvalidBonus("total bonus can only decrease"))
        );

        let lowered = BonusParameters {
            total_bonus_x64: X64(current.total_bonus_x64.0 - 1),
            compounder_bonus_x64: X64(current.compounder_bonus_x64.0 - 1),
        };
        assert!(current.validate_update(&lowered).is_ok());

        // Raising the compounder share inside the total is allowed.
        let more_for_caller = BonusParameters {
            compounder_bonus_x64: current.total_bonus_x64,
            ..current
        };
        assert!(current.validate_update(&more_for_caller).is_ok());
    }

    #[test]
    fn test_twap_window_must_be_positive() {
        assert!(TwapParameters::new(50, 0).is_err());
        assert_eq!(TwapParameters::new(50, 10).unwrap().window_seconds, 10);
    }
}
