use crate::error::{ProtocolError, ProtocolResult};
use crate::position_manager::{
    DecreaseLiquidityParams, IncreaseLiquidityParams, IncreaseLiquidityResult, PositionManager,
};
use compoundor_domain::math::Rounding;
use compoundor_domain::math::concentrated_liquidity::{
    amounts_for_liquidity, liquidity_for_amounts,
};
use compoundor_domain::math::tick_math::sqrt_ratio_at_tick;
use compoundor_domain::position::{PositionInfo, TickRange};
use compoundor_domain::{AccountId, PositionId, TokenAmount, TokenId};
use std::collections::HashMap;
use tracing::debug;

type PoolKey = (TokenId, TokenId, u32);

#[derive(Debug, Clone)]
struct StoredPosition {
    info: PositionInfo,
    owner: AccountId,
    owed0: TokenAmount,
    owed1: TokenAmount,
}

/// Position manager holding liquidity and uncollected fees in memory.
///
/// Each pool's current tick is set by the caller; it decides the token ratio
/// of every mint and burn.
#[derive(Debug, Clone, Default)]
pub struct MemoryPositionManager {
    positions: HashMap<PositionId, StoredPosition>,
    pool_ticks: HashMap<PoolKey, i32>,
    next_id: u64,
}

impl MemoryPositionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current tick of the pool behind `(token0, token1, fee)`.
    pub fn set_pool_tick(&mut self, token0: TokenId, token1: TokenId, fee: u32, tick: i32) {
        self.pool_ticks.insert((token0, token1, fee), tick);
    }

    fn tick_for(&self, info: &PositionInfo) -> i32 {
        self.pool_ticks
            .get(&(info.token0, info.token1, info.fee))
            .copied()
            .unwrap_or(0)
    }

    /// Mints a new position for `owner` from the given amounts.
    #[allow(clippy::too_many_arguments)]
    pub fn mint(
        &mut self,
        owner: AccountId,
        token0: TokenId,
        token1: TokenId,
        fee: u32,
        tick_range: TickRange,
        amount0: TokenAmount,
        amount1: TokenAmount,
    ) -> ProtocolResult<(PositionId, IncreaseLiquidityResult)> {
        self.next_id += 1;
        let id = PositionId::from(self.next_id);
        let mut info = PositionInfo {
            id,
            token0,
            token1,
            fee,
            tick_range,
            liquidity: 0,
        };
        let minted = mint_amounts(self.tick_for(&info), tick_range, amount0, amount1)?;
        info.liquidity = minted.liquidity;

        debug!(position = %id, liquidity = minted.liquidity, "Minted position");
        self.positions.insert(
            id,
            StoredPosition {
                info,
                owner,
                owed0: TokenAmount::zero(),
                owed1: TokenAmount::zero(),
            },
        );
        Ok((id, minted))
    }

    /// Adds uncollected fees to a position.
    pub fn accrue_fees(
        &mut self,
        id: PositionId,
        fee0: TokenAmount,
        fee1: TokenAmount,
    ) -> ProtocolResult<()> {
        let stored = self.stored_mut(id)?;
        stored.owed0 += fee0;
        stored.owed1 += fee1;
        Ok(())
    }

    /// Fees accrued and not yet collected.
    pub fn owed(&self, id: PositionId) -> ProtocolResult<(TokenAmount, TokenAmount)> {
        let stored = self.stored(id)?;
        Ok((stored.owed0, stored.owed1))
    }

    pub fn position_ids(&self) -> Vec<PositionId> {
        let mut ids: Vec<_> = self.positions.keys().copied().collect();
        ids.sort();
        ids
    }

    fn stored(&self, id: PositionId) -> ProtocolResult<&StoredPosition> {
        self.positions
            .get(&id)
            .ok_or(ProtocolError::UnknownPosition(id))
    }

    fn stored_mut(&mut self, id: PositionId) -> ProtocolResult<&mut StoredPosition> {
        self.positions
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownPosition(id))
    }
}

fn mint_amounts(
    tick: i32,
    range: TickRange,
    amount0: TokenAmount,
    amount1: TokenAmount,
) -> ProtocolResult<IncreaseLiquidityResult> {
    let sqrt_price = sqrt_ratio_at_tick(tick)?;
    let sqrt_a = sqrt_ratio_at_tick(range.lower)?;
    let sqrt_b = sqrt_ratio_at_tick(range.upper)?;

    let liquidity = liquidity_for_amounts(sqrt_price, sqrt_a, sqrt_b, amount0.0, amount1.0)?;
    if liquidity == 0 {
        return Ok(IncreaseLiquidityResult::default());
    }

    let (used0, used1) =
        amounts_for_liquidity(sqrt_price, sqrt_a, sqrt_b, liquidity, Rounding::Up)?;
    Ok(IncreaseLiquidityResult {
        liquidity,
        amount0: TokenAmount(used0.min(amount0.0)),
        amount1: TokenAmount(used1.min(amount1.0)),
    })
}

fn check_min(what: &'static str, minimum: TokenAmount, actual: TokenAmount) -> ProtocolResult<()> {
    if actual < minimum {
        return Err(ProtocolError::Slippage {
            what,
            minimum: minimum.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

impl PositionManager for MemoryPositionManager {
    fn position(&self, id: PositionId) -> ProtocolResult<PositionInfo> {
        Ok(self.stored(id)?.info.clone())
    }

    fn owner_of(&self, id: PositionId) -> ProtocolResult<AccountId> {
        Ok(self.stored(id)?.owner)
    }

    fn collect(&mut self, id: PositionId) -> ProtocolResult<(TokenAmount, TokenAmount)> {
        let stored = self.stored_mut(id)?;
        let collected = (stored.owed0, stored.owed1);
        stored.owed0 = TokenAmount::zero();
        stored.owed1 = TokenAmount::zero();
        Ok(collected)
    }

    fn increase_liquidity(
        &mut self,
        params: IncreaseLiquidityParams,
    ) -> ProtocolResult<IncreaseLiquidityResult> {
        let info = self.stored(params.position)?.info.clone();
        let minted = mint_amounts(
            self.tick_for(&info),
            info.tick_range,
            params.amount0_desired,
            params.amount1_desired,
        )?;
        check_min("amount0", params.amount0_min, minted.amount0)?;
        check_min("amount1", params.amount1_min, minted.amount1)?;

        let stored = self.stored_mut(params.position)?;
        stored.info.liquidity = stored
            .info
            .liquidity
            .checked_add(minted.liquidity)
            .ok_or(compoundor_domain::DomainError::MathOverflow)?;
        Ok(minted)
    }

    fn decrease_liquidity_and_collect(
        &mut self,
        params: DecreaseLiquidityParams,
    ) -> ProtocolResult<(TokenAmount, TokenAmount)> {
        let info = self.stored(params.position)?.info.clone();
        if params.liquidity > info.liquidity {
            return Err(ProtocolError::InsufficientLiquidity {
                position: params.position,
                requested: params.liquidity,
                available: info.liquidity,
            });
        }

        let (amount0, amount1) = amounts_for_liquidity(
            sqrt_ratio_at_tick(self.tick_for(&info))?,
            sqrt_ratio_at_tick(info.tick_range.lower)?,
            sqrt_ratio_at_tick(info.tick_range.upper)?,
            params.liquidity,
            Rounding::Down,
        )?;
        let (amount0, amount1) = (TokenAmount(amount0), TokenAmount(amount1));
        check_min("amount0", params.amount0_min, amount0)?;
        check_min("amount1", params.amount1_min, amount1)?;

        let stored = self.stored_mut(params.position)?;
        stored.info.liquidity -= params.liquidity;
        let out = (amount0 + stored.owed0, amount1 + stored.owed1);
        stored.owed0 = TokenAmount::zero();
        stored.owed1 = TokenAmount::zero();
        Ok(out)
    }

    fn transfer_position(
        &mut self,
        id: PositionId,
        from: AccountId,
        to: AccountId,
    ) -> ProtocolResult<()> {
        let stored = self.stored_mut(id)?;
        if stored.owner != from {
            return Err(ProtocolError::NotAuthorized {
                position: id,
                account: from,
            });
        }
        stored.owner = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> (TokenId, TokenId) {
        (TokenId::from_low_u64_be(1), TokenId::from_low_u64_be(2))
    }

    fn minted(manager: &mut MemoryPositionManager, lower: i32, upper: i32) -> PositionId {
        let (t0, t1) = tokens();
        manager
            .mint(
                AccountId::repeat_byte(7),
                t0,
                t1,
                3000,
                TickRange::new(lower, upper).unwrap(),
                TokenAmount::from(1_000_000u64),
                TokenAmount::from(1_000_000u64),
            )
            .unwrap()
            .0
    }

    #[test]
    fn test_collect_drains_owed_fees() {
        let mut manager = MemoryPositionManager::new();
        let id = minted(&mut manager, -600, 600);
        manager
            .accrue_fees(id, TokenAmount::from(10u64), TokenAmount::from(20u64))
            .unwrap();

        let collected = manager.collect(id).unwrap();
        assert_eq!(collected, (TokenAmount::from(10u64), TokenAmount::from(20u64)));
        assert_eq!(
            manager.collect(id).unwrap(),
            (TokenAmount::zero(), TokenAmount::zero())
        );
    }

    #[test]
    fn test_increase_never_uses_more_than_desired() {
        let mut manager = MemoryPositionManager::new();
        let id = minted(&mut manager, -600, 600);
        let before = manager.position(id).unwrap().liquidity;

        let params = IncreaseLiquidityParams {
            position: id,
            amount0_desired: TokenAmount::from(5_000u64),
            amount1_desired: TokenAmount::from(50_000u64),
            amount0_min: TokenAmount::zero(),
            amount1_min: TokenAmount::zero(),
        };
        let result = manager.increase_liquidity(params).unwrap();
        assert!(result.amount0 <= params.amount0_desired);
        assert!(result.amount1 <= params.amount1_desired);
        assert!(result.liquidity > 0);
        assert_eq!(
            manager.position(id).unwrap().liquidity,
            before + result.liquidity
        );
    }

    #[test]
    fn test_increase_out_of_range_uses_one_token() {
        let mut manager = MemoryPositionManager::new();
        let id = minted(&mut manager, 600, 1200);
        let result = manager
            .increase_liquidity(IncreaseLiquidityParams {
                position: id,
                amount0_desired: TokenAmount::from(5_000u64),
                amount1_desired: TokenAmount::from(5_000u64),
                amount0_min: TokenAmount::zero(),
                amount1_min: TokenAmount::zero(),
            })
            .unwrap();
        assert!(!result.amount0.is_zero());
        assert!(result.amount1.is_zero());
    }

    #[test]
    fn test_increase_slippage() {
        let mut manager = MemoryPositionManager::new();
        let id = minted(&mut manager, -600, 600);
        let err = manager
            .increase_liquidity(IncreaseLiquidityParams {
                position: id,
                amount0_desired: TokenAmount::from(5_000u64),
                amount1_desired: TokenAmount::from(5_000u64),
                amount0_min: TokenAmount::from(6_000u64),
                amount1_min: TokenAmount::zero(),
            })
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Slippage { .. }));
    }

    #[test]
    fn test_decrease_returns_principal_and_fees() {
        let mut manager = MemoryPositionManager::new();
        let id = minted(&mut manager, -600, 600);
        manager
            .accrue_fees(id, TokenAmount::from(3u64), TokenAmount::from(4u64))
            .unwrap();
        let liquidity = manager.position(id).unwrap().liquidity;

        let (a0, a1) = manager
            .decrease_liquidity_and_collect(DecreaseLiquidityParams {
                position: id,
                liquidity,
                amount0_min: TokenAmount::zero(),
                amount1_min: TokenAmount::zero(),
            })
            .unwrap();
        assert!(a0 > TokenAmount::from(3u64));
        assert!(a1 > TokenAmount::from(4u64));
        assert_eq!(manager.position(id).unwrap().liquidity, 0);

        let err = manager
            .decrease_liquidity_and_collect(DecreaseLiquidityParams {
                position: id,
                liquidity: 1,
                amount0_min: TokenAmount::zero(),
                amount1_min: TokenAmount::zero(),
            })
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn test_transfer_requires_current_owner() {
        let mut manager = MemoryPositionManager::new();
        let id = minted(&mut manager, -600, 600);
        let owner = AccountId::repeat_byte(7);
        let other = AccountId::repeat_byte(8);

        assert!(manager.transfer_position(id, other, other).is_err());
        manager.transfer_position(id, owner, other).unwrap();
        assert_eq!(manager.owner_of(id).unwrap(), other);
    }
}
