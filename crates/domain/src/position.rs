use crate::error::{DomainError, DomainResult};
use crate::ids::{PositionId, TokenId};
use crate::math::concentrated_liquidity::RangePosition;
use crate::math::tick_math::{MAX_TICK, MIN_TICK};
use serde::{Deserialize, Serialize};

/// Fee tiers in hundredths of a basis point, cheapest first.
pub const FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

/// Fee tier denominator (1e6 = 100%).
pub const FEE_DENOMINATOR: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

impl TickRange {
    pub fn new(lower: i32, upper: i32) -> DomainResult<Self> {
        if lower >= upper || lower < MIN_TICK || upper > MAX_TICK {
            return Err(DomainError::InvalidTickRange { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    pub fn position_of(&self, tick: i32) -> RangePosition {
        RangePosition::of(tick, self.lower, self.upper)
    }
}

/// Metadata of a position as reported by the position primitive.
///
/// Liquidity and fee state stay with the primitive; only the fields the
/// compounder needs are mirrored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub id: PositionId,
    pub token0: TokenId,
    pub token1: TokenId,
    pub fee: u32,
    pub tick_range: TickRange,
    pub liquidity: u128,
}
