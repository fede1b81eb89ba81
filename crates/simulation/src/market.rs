//! In-memory market the simulated engine runs against.

use compoundor_domain::position::TickRange;
use compoundor_domain::{AccountId, PoolId, PositionId, TokenAmount, TokenId};
use compoundor_engine::{AdminCap, CompoundingEngine, DepositReceipt, EngineConfig, EngineResult};
use compoundor_protocols::memory::{MemoryPools, MemoryPositionManager, MemoryTokens};
use compoundor_protocols::{PositionManager, ProtocolResult};
use tracing::debug;

/// Engine over the in-memory collaborators.
pub type MemoryEngine = CompoundingEngine<MemoryPositionManager, MemoryPools, MemoryTokens>;

/// Pools and positions set up before an engine takes over.
///
/// The position manager prices mints at its own copy of each pool's tick;
/// the market keeps both in step.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMarket {
    position_manager: MemoryPositionManager,
    pools: MemoryPools,
    tokens: MemoryTokens,
}

impl SimulatedMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pool with spot and TWAP at `tick`.
    pub fn create_pool(
        &mut self,
        token_a: TokenId,
        token_b: TokenId,
        fee: u32,
        tick: i32,
    ) -> ProtocolResult<PoolId> {
        let pool = self.pools.create_pool(token_a, token_b, fee, tick);
        let state = self.pools.state(pool)?;
        self.position_manager
            .set_pool_tick(state.token0, state.token1, state.fee, tick);
        Ok(pool)
    }

    /// Mints a position in `pool` owned by `owner`.
    pub fn mint(
        &mut self,
        owner: AccountId,
        pool: PoolId,
        tick_range: TickRange,
        amount0: TokenAmount,
        amount1: TokenAmount,
    ) -> ProtocolResult<PositionId> {
        let state = self.pools.state(pool)?.clone();
        let (position, minted) = self.position_manager.mint(
            owner,
            state.token0,
            state.token1,
            state.fee,
            tick_range,
            amount0,
            amount1,
        )?;
        debug!(position = %position, liquidity = minted.liquidity, "Minted simulated position");
        Ok(position)
    }

    /// Hands the market to a new engine.
    pub fn into_engine(
        self,
        address: AccountId,
        treasury: AccountId,
        config: EngineConfig,
    ) -> (MemoryEngine, AdminCap) {
        CompoundingEngine::new(
            address,
            treasury,
            config,
            self.position_manager,
            self.pools,
            self.tokens,
        )
    }
}

/// Transfers `position` from `owner` to the engine and registers it.
pub fn deposit(engine: &mut MemoryEngine, position: PositionId, owner: AccountId) -> EngineResult<DepositReceipt> {
    let address = engine.address();
    engine
        .position_manager_mut()
        .transfer_position(position, owner, address)?;
    engine.accept_deposit(position, owner)
}

/// Moves a pool's spot and TWAP ticks.
pub fn move_pool(engine: &mut MemoryEngine, pool: PoolId, spot_tick: i32, twap_tick: i32) -> ProtocolResult<()> {
    engine.pool_source_mut().set_spot_tick(pool, spot_tick)?;
    engine.pool_source_mut().set_twap_tick(pool, twap_tick)?;
    let state = engine.pool_source().state(pool)?.clone();
    engine
        .position_manager_mut()
        .set_pool_tick(state.token0, state.token1, state.fee, spot_tick);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use compoundor_protocols::PoolSource;

    #[test]
    fn test_market_deposit_and_move() {
        let token0 = TokenId::from_low_u64_be(0xa0);
        let token1 = TokenId::from_low_u64_be(0xa1);
        let owner = AccountId::repeat_byte(0x01);

        let mut market = SimulatedMarket::new();
        let pool = market.create_pool(token1, token0, 3000, 0).unwrap();
        let position = market
            .mint(
                owner,
                pool,
                TickRange::new(-600, 600).unwrap(),
                TokenAmount::from(1_000_000u64),
                TokenAmount::from(1_000_000u64),
            )
            .unwrap();

        let (mut engine, _admin) = market.into_engine(
            AccountId::repeat_byte(0xee),
            AccountId::repeat_byte(0x77),
            EngineConfig::default(),
        );
        deposit(&mut engine, position, owner).unwrap();
        assert_eq!(engine.owner_of(position), Some(owner));

        move_pool(&mut engine, pool, 50, 40).unwrap();
        assert_eq!(engine.pool_source().spot_tick(pool).unwrap(), 50);
        assert_eq!(engine.pool_source().time_weighted_tick(pool, 60).unwrap(), 40);

        let info = engine.position_manager().position(position).unwrap();
        assert_eq!((info.token0, info.token1), (token0, token1));
    }
}
