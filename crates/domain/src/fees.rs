//! Splitting compounded fees between caller, protocol and owner.
//!
//! For each token the split satisfies, exactly:
//! `available == compounded + bonus + protocol_fee + buffer`.
//! The caller bonus rounds up and the protocol fee gives up a unit whenever
//! it did, so rounding dust is absorbed by the protocol.

use crate::error::{DomainError, DomainResult};
use crate::math::fixed_point::{Q64, Rounding, mul_div};
use crate::parameters::BonusParameters;
use crate::token::TokenAmount;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Largest amount that may be reinvested out of `available`.
///
/// Keeps `total_bonus` of the reinvested amount in reserve so the fees
/// computed afterwards always fit: `budget * (1 + total) <= available`.
pub fn reinvest_budget(available: TokenAmount, params: &BonusParameters) -> DomainResult<TokenAmount> {
    let denominator = Q64 + params.total_bonus_x64.as_u256();
    mul_div(available.0, Q64, denominator, Rounding::Down).map(TokenAmount)
}

/// Caller bonus and protocol fee for one token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub bonus: TokenAmount,
    pub protocol_fee: TokenAmount,
}

impl FeeSplit {
    /// `bonus = ceil(compounded * compounder / 2^64)`. The protocol fee is
    /// derived from the bonus as `floor(bonus * total / compounder) - bonus`,
    /// one unit less when the bonus was rounded up, and capped so that
    /// `bonus + protocol_fee <= ceil(compounded * total / 2^64)`.
    ///
    /// With a zero compounder share the protocol fee is the full
    /// `floor(compounded * total / 2^64)`.
    pub fn compute(compounded: TokenAmount, params: &BonusParameters) -> DomainResult<Self> {
        if params.compounder_bonus_x64.is_zero() {
            let protocol_fee = params
                .total_bonus_x64
                .apply(compounded.0, Rounding::Down)?;
            return Ok(Self {
                bonus: TokenAmount::zero(),
                protocol_fee: TokenAmount(protocol_fee),
            });
        }

        let compounder = params.compounder_bonus_x64.as_u256();
        let total = params.total_bonus_x64.as_u256();
        let bonus_floor = mul_div(compounded.0, compounder, Q64, Rounding::Down)?;
        let bonus = mul_div(compounded.0, compounder, Q64, Rounding::Up)?;
        let rounded_up = U256::from(u8::from(bonus != bonus_floor));

        let scaled = mul_div(bonus, total, compounder, Rounding::Down)?;
        let derived = scaled.saturating_sub(bonus).saturating_sub(rounded_up);
        let ceiling = mul_div(compounded.0, total, Q64, Rounding::Up)?.saturating_sub(bonus);

        Ok(Self {
            bonus: TokenAmount(bonus),
            protocol_fee: TokenAmount(derived.min(ceiling)),
        })
    }

    pub fn total(&self) -> TokenAmount {
        self.bonus + self.protocol_fee
    }
}

/// Full accounting of one token through a compound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSettlement {
    pub available: TokenAmount,
    pub compounded: TokenAmount,
    pub bonus: TokenAmount,
    pub protocol_fee: TokenAmount,
    pub buffer: TokenAmount,
}

impl TokenSettlement {
    /// Derives the owner's buffer and checks the conservation identity.
    pub fn settle(
        available: TokenAmount,
        compounded: TokenAmount,
        split: FeeSplit,
    ) -> DomainResult<Self> {
        let violated = || DomainError::ConservationViolated {
            available: available.to_string(),
            compounded: compounded.to_string(),
            bonus: split.bonus.to_string(),
            protocol_fee: split.protocol_fee.to_string(),
        };

        let buffer = available
            .checked_sub(compounded)
            .and_then(|rest| rest.checked_sub(split.bonus))
            .and_then(|rest| rest.checked_sub(split.protocol_fee))
            .ok_or_else(violated)?;

        let settlement = Self {
            available,
            compounded,
            bonus: split.bonus,
            protocol_fee: split.protocol_fee,
            buffer,
        };
        if settlement.sum() != Some(available) {
            return Err(violated());
        }
        Ok(settlement)
    }

    fn sum(&self) -> Option<TokenAmount> {
        self.compounded
            .checked_add(self.bonus)?
            .checked_add(self.protocol_fee)?
            .checked_add(self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fixed_point::X64;

    fn params(total: u64, compounder: u64) -> BonusParameters {
        BonusParameters::new(X64(total), X64(compounder)).unwrap()
    }

    #[test]
    fn test_two_percent_scenario() {
        let p = BonusParameters::default();
        let collected = TokenAmount::from(1_000_000u64);
        let budget = reinvest_budget(collected, &p).unwrap();
        assert_eq!(budget, TokenAmount::from(980_392u64));

        let split = FeeSplit::compute(budget, &p).unwrap();
        assert_eq!(split.bonus, TokenAmount::from(9_804u64));
        assert_eq!(split.protocol_fee, TokenAmount::from(9_803u64));

        let settlement = TokenSettlement::settle(collected, budget, split).unwrap();
        assert_eq!(settlement.buffer, TokenAmount::from(1u64));
    }

    #[test]
    fn test_rounded_up_bonus_takes_unit_from_protocol() {
        let p = BonusParameters::default();
        let split = FeeSplit::compute(TokenAmount::from(900_000u64), &p).unwrap();
        // 2^64/100 is not representable, so 900_000 * compounder / 2^64 is
        // just below 9_000 and the bonus is rounded up to it.
        assert_eq!(split.bonus, TokenAmount::from(9_000u64));
        assert_eq!(split.protocol_fee, TokenAmount::from(8_999u64));
    }

    #[test]
    fn test_exact_division_has_no_rounding() {
        // 1/128 caller and 1/64 total are exact in 64.64 fixed point.
        let p = params(1 << 58, 1 << 57);
        let split = FeeSplit::compute(TokenAmount::from(640_000u64), &p).unwrap();
        assert_eq!(split.bonus, TokenAmount::from(5_000u64));
        assert_eq!(split.protocol_fee, TokenAmount::from(5_000u64));
    }

    #[test]
    fn test_protocol_fee_follows_bonus() {
        // Caller 1/1024, total 1/32: the bonus of 1946 units is 1.9 rounded
        // up to 2, so the fee is 2 * 32 - 2 - 1 = 61, capped at
        // ceil(60.8125) - 2 = 59.
        let p = params(1 << 59, 1 << 54);
        let split = FeeSplit::compute(TokenAmount::from(1_946u64), &p).unwrap();
        assert_eq!(split.bonus, TokenAmount::from(2u64));
        assert_eq!(split.protocol_fee, TokenAmount::from(59u64));

        // 1024 units give an exact bonus of 1, so no unit is taken off.
        let split = FeeSplit::compute(TokenAmount::from(1_024u64), &p).unwrap();
        assert_eq!(split.bonus, TokenAmount::from(1u64));
        assert_eq!(split.protocol_fee, TokenAmount::from(31u64));
    }

    #[test]
    fn test_rounding_favours_caller_over_protocol() {
        let q = u64::MAX / 1000;
        let p = params(3 * q, q);
        for amount in [1u64, 7, 999, 1_001, 123_457] {
            let compounded = TokenAmount::from(amount);
            let split = FeeSplit::compute(compounded, &p).unwrap();
            let exact_bonus = mul_div(compounded.0, p.compounder_bonus_x64.as_u256(), Q64, Rounding::Down).unwrap();
            let exact_fee = mul_div(compounded.0, p.protocol_bonus_x64().as_u256(), Q64, Rounding::Up).unwrap();
            assert!(split.bonus.0 >= exact_bonus && split.bonus.0 - exact_bonus <= U256::one());
            assert!(split.protocol_fee.0 <= exact_fee && exact_fee - split.protocol_fee.0 <= U256::one());
        }
    }

    #[test]
    fn test_zero_compounder_share_goes_to_protocol() {
        let p = params(u64::MAX / 50, 0);
        let split = FeeSplit::compute(TokenAmount::from(1_000_000u64), &p).unwrap();
        assert!(split.bonus.is_zero());
        assert_eq!(split.protocol_fee, TokenAmount::from(19_999u64));
    }

    #[test]
    fn test_bonus_monotonic_in_compounder_share() {
        let compounded = TokenAmount::from(777_777u64);
        let total = u64::MAX / 20;
        let mut previous = TokenAmount::zero();
        for step in 0..=10u64 {
            let p = params(total, total / 10 * step);
            let split = FeeSplit::compute(compounded, &p).unwrap();
            assert!(split.bonus >= previous);
            previous = split.bonus;
        }
    }

    #[test]
    fn test_budget_always_leaves_room_for_fees() {
        let p = params(u64::MAX / 20, u64::MAX / 40);
        for amount in [0u64, 1, 2, 19, 20, 21, 1_000, 999_999, u64::MAX] {
            let available = TokenAmount::from(amount);
            let budget = reinvest_budget(available, &p).unwrap();
            let split = FeeSplit::compute(budget, &p).unwrap();
            assert!(TokenSettlement::settle(available, budget, split).is_ok());
        }
    }

    #[test]
    fn test_settle_rejects_over_allocation() {
        let split = FeeSplit {
            bonus: TokenAmount::from(10u64),
            protocol_fee: TokenAmount::from(10u64),
        };
        let err = TokenSettlement::settle(TokenAmount::from(100u64), TokenAmount::from(90u64), split);
        assert!(matches!(err, Err(DomainError::ConservationViolated { .. })));
    }
}
