use crate::error::{ProtocolError, ProtocolResult};
use crate::pool::PoolSource;
use compoundor_domain::math::Rounding;
use compoundor_domain::math::fixed_point::mul_div;
use compoundor_domain::math::tick_math::{quote_token0_in_token1, quote_token1_in_token0};
use compoundor_domain::position::FEE_DENOMINATOR;
use compoundor_domain::{PoolId, TokenAmount, TokenId};
use primitive_types::U256;
use std::collections::HashMap;
use tracing::debug;

/// State of one simulated pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub token0: TokenId,
    pub token1: TokenId,
    pub fee: u32,
    pub spot_tick: i32,
    pub twap_tick: i32,
}

/// Pools whose spot and time-weighted ticks are set directly.
///
/// Swaps execute at the spot tick after the pool fee and do not move the price.
#[derive(Debug, Clone, Default)]
pub struct MemoryPools {
    pools: HashMap<PoolId, PoolState>,
    index: HashMap<(TokenId, TokenId, u32), PoolId>,
    next_id: u64,
}

fn sorted(a: TokenId, b: TokenId) -> (TokenId, TokenId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl MemoryPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pool with both ticks at `tick`. Tokens are sorted.
    pub fn create_pool(&mut self, token_a: TokenId, token_b: TokenId, fee: u32, tick: i32) -> PoolId {
        let (token0, token1) = sorted(token_a, token_b);
        if let Some(existing) = self.index.get(&(token0, token1, fee)) {
            return *existing;
        }

        self.next_id += 1;
        let id = PoolId::from_low_u64_be(0xff00_0000 + self.next_id);
        self.pools.insert(
            id,
            PoolState {
                token0,
                token1,
                fee,
                spot_tick: tick,
                twap_tick: tick,
            },
        );
        self.index.insert((token0, token1, fee), id);
        id
    }

    pub fn state(&self, pool: PoolId) -> ProtocolResult<&PoolState> {
        self.pools.get(&pool).ok_or(ProtocolError::UnknownPool(pool))
    }

    fn state_mut(&mut self, pool: PoolId) -> ProtocolResult<&mut PoolState> {
        self.pools
            .get_mut(&pool)
            .ok_or(ProtocolError::UnknownPool(pool))
    }

    pub fn set_spot_tick(&mut self, pool: PoolId, tick: i32) -> ProtocolResult<()> {
        self.state_mut(pool)?.spot_tick = tick;
        Ok(())
    }

    pub fn set_twap_tick(&mut self, pool: PoolId, tick: i32) -> ProtocolResult<()> {
        self.state_mut(pool)?.twap_tick = tick;
        Ok(())
    }

    /// Moves spot and time-weighted tick together.
    pub fn set_tick(&mut self, pool: PoolId, tick: i32) -> ProtocolResult<()> {
        let state = self.state_mut(pool)?;
        state.spot_tick = tick;
        state.twap_tick = tick;
        Ok(())
    }
}

impl PoolSource for MemoryPools {
    fn pool_for(&self, token_a: TokenId, token_b: TokenId, fee: u32) -> Option<PoolId> {
        let (token0, token1) = sorted(token_a, token_b);
        self.index.get(&(token0, token1, fee)).copied()
    }

    fn pool_tokens(&self, pool: PoolId) -> ProtocolResult<(TokenId, TokenId, u32)> {
        let state = self.state(pool)?;
        Ok((state.token0, state.token1, state.fee))
    }

    fn spot_tick(&self, pool: PoolId) -> ProtocolResult<i32> {
        Ok(self.state(pool)?.spot_tick)
    }

    fn time_weighted_tick(&self, pool: PoolId, window_seconds: u32) -> ProtocolResult<i32> {
        if window_seconds == 0 {
            return Err(ProtocolError::ObservationUnavailable(window_seconds));
        }
        Ok(self.state(pool)?.twap_tick)
    }

    fn swap(
        &mut self,
        pool: PoolId,
        token_in: TokenId,
        amount_in: TokenAmount,
        min_amount_out: TokenAmount,
    ) -> ProtocolResult<TokenAmount> {
        let state = self.state(pool)?;
        let after_fee = mul_div(
            amount_in.0,
            U256::from(FEE_DENOMINATOR - state.fee),
            U256::from(FEE_DENOMINATOR),
            Rounding::Down,
        )?;

        let out = if token_in == state.token0 {
            quote_token0_in_token1(after_fee, state.spot_tick)?
        } else if token_in == state.token1 {
            quote_token1_in_token0(after_fee, state.spot_tick)?
        } else {
            return Err(ProtocolError::UnsupportedToken {
                pool,
                token: token_in,
            });
        };
        let out = TokenAmount(out);

        if out < min_amount_out {
            return Err(ProtocolError::Slippage {
                what: "swap output",
                minimum: min_amount_out.to_string(),
                actual: out.to_string(),
            });
        }

        debug!(pool = ?pool, amount_in = %amount_in, amount_out = %out, "Swapped");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (MemoryPools, PoolId, TokenId, TokenId) {
        let t0 = TokenId::from_low_u64_be(1);
        let t1 = TokenId::from_low_u64_be(2);
        let mut pools = MemoryPools::new();
        let pool = pools.create_pool(t1, t0, 3000, 0);
        (pools, pool, t0, t1)
    }

    #[test]
    fn test_pool_lookup_is_order_insensitive() {
        let (pools, pool, t0, t1) = setup();
        assert_eq!(pools.pool_for(t0, t1, 3000), Some(pool));
        assert_eq!(pools.pool_for(t1, t0, 3000), Some(pool));
        assert_eq!(pools.pool_for(t0, t1, 500), None);
        assert_eq!(pools.pool_tokens(pool).unwrap(), (t0, t1, 3000));
    }

    #[test]
    fn test_swap_charges_pool_fee() {
        let (mut pools, pool, t0, _) = setup();
        let out = pools
            .swap(pool, t0, TokenAmount::from(1_000_000u64), TokenAmount::zero())
            .unwrap();
        assert_eq!(out, TokenAmount::from(997_000u64));
    }

    #[test]
    fn test_swap_respects_minimum_output() {
        let (mut pools, pool, _, t1) = setup();
        let err = pools
            .swap(
                pool,
                t1,
                TokenAmount::from(1_000u64),
                TokenAmount::from(1_000u64),
            )
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Slippage { .. }));

        let stranger = TokenId::from_low_u64_be(9);
        assert!(matches!(
            pools.swap(pool, stranger, TokenAmount::from(1u64), TokenAmount::zero()),
            Err(ProtocolError::UnsupportedToken { .. })
        ));
    }

    #[test]
    fn test_spot_and_twap_can_diverge() {
        let (mut pools, pool, _, _) = setup();
        pools.set_spot_tick(pool, 250).unwrap();
        assert_eq!(pools.spot_tick(pool).unwrap(), 250);
        assert_eq!(pools.time_weighted_tick(pool, 60).unwrap(), 0);
        pools.set_tick(pool, -40).unwrap();
        assert_eq!(pools.time_weighted_tick(pool, 60).unwrap(), -40);
    }
}
