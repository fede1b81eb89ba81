//! The auto-compound call contract shared by the engine and its callers.

use crate::error::DomainError;
use crate::ids::PositionId;
use crate::token::TokenAmount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the caller's bonus is denominated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BonusConversion {
    /// Paid in both tokens, proportionally to what was compounded.
    #[default]
    None = 0,
    /// Converted entirely into token0.
    Token0 = 1,
    /// Converted entirely into token1.
    Token1 = 2,
}

impl BonusConversion {
    /// Whether the conversion needs a swap through the position's pool.
    pub fn needs_swap(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl TryFrom<u8> for BonusConversion {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Token0),
            2 => Ok(Self::Token1),
            other => Err(DomainError::InvalidBonusConversion(other)),
        }
    }
}

impl fmt::Display for BonusConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Token0 => write!(f, "token0"),
            Self::Token1 => write!(f, "token1"),
        }
    }
}

/// Arguments of an auto-compound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoCompoundParams {
    pub position: PositionId,
    pub bonus_conversion: BonusConversion,
    /// Transfer the bonus out immediately instead of crediting it.
    pub withdraw_bonus: bool,
    /// Rebalance the harvested amounts toward the range's ratio first.
    pub do_swap: bool,
}

impl AutoCompoundParams {
    pub fn new(position: PositionId) -> Self {
        Self {
            position,
            bonus_conversion: BonusConversion::None,
            withdraw_bonus: false,
            do_swap: false,
        }
    }

    pub fn with_conversion(mut self, conversion: BonusConversion) -> Self {
        self.bonus_conversion = conversion;
        self
    }

    pub fn with_withdraw_bonus(mut self, withdraw_bonus: bool) -> Self {
        self.withdraw_bonus = withdraw_bonus;
        self
    }

    pub fn with_swap(mut self, do_swap: bool) -> Self {
        self.do_swap = do_swap;
        self
    }

    /// Whether the call reads the pool price at all.
    pub fn needs_price_guard(&self) -> bool {
        self.do_swap || self.bonus_conversion.needs_swap()
    }
}

/// What an auto-compound call returns to its caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoCompoundResult {
    pub bonus0: TokenAmount,
    pub bonus1: TokenAmount,
    pub compounded0: TokenAmount,
    pub compounded1: TokenAmount,
}

impl AutoCompoundResult {
    /// True when nothing was reinvested or paid out.
    pub fn is_empty(&self) -> bool {
        self.bonus0.is_zero()
            && self.bonus1.is_zero()
            && self.compounded0.is_zero()
            && self.compounded1.is_zero()
    }
}
