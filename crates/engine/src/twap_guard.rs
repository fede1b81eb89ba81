//! Spot price manipulation guard.
//!
//! Any swap the engine performs prices against the pool's spot tick. Before
//! trusting it, the spot tick must be within `max_tick_difference` of the
//! time-weighted tick over `window_seconds`.

use crate::error::{EngineError, EngineResult};
use compoundor_domain::PoolId;
use compoundor_domain::parameters::TwapParameters;
use compoundor_protocols::PoolSource;
use tracing::warn;

/// A pool price that passed the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardedPrice {
    pub pool: PoolId,
    pub spot_tick: i32,
    pub twap_tick: i32,
    pub max_tick_difference: u32,
}

pub fn check_price<S: PoolSource>(
    pools: &S,
    pool: PoolId,
    twap: &TwapParameters,
) -> EngineResult<GuardedPrice> {
    let spot_tick = pools.spot_tick(pool)?;
    let twap_tick = pools.time_weighted_tick(pool, twap.window_seconds)?;

    let deviation = (i64::from(spot_tick) - i64::from(twap_tick)).unsigned_abs();
    if deviation > u64::from(twap.max_tick_difference) {
        warn!(
            pool = ?pool,
            spot_tick,
            twap_tick,
            max = twap.max_tick_difference,
            "Price deviation above limit"
        );
        return Err(EngineError::PriceProtectionTriggered {
            spot_tick,
            twap_tick,
            max_tick_difference: twap.max_tick_difference,
        });
    }

    Ok(GuardedPrice {
        pool,
        spot_tick,
        twap_tick,
        max_tick_difference: twap.max_tick_difference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use compoundor_domain::TokenId;
    use compoundor_protocols::memory::MemoryPools;

    fn pools() -> (MemoryPools, PoolId) {
        let mut pools = MemoryPools::new();
        let pool = pools.create_pool(
            TokenId::from_low_u64_be(1),
            TokenId::from_low_u64_be(2),
            3000,
            1_000,
        );
        (pools, pool)
    }

    #[test]
    fn test_deviation_at_limit_passes() {
        let (mut pools, pool) = pools();
        pools.set_spot_tick(pool, 1_100).unwrap();
        let guarded = check_price(&pools, pool, &TwapParameters::default()).unwrap();
        assert_eq!(guarded.spot_tick, 1_100);
        assert_eq!(guarded.twap_tick, 1_000);
    }

    #[test]
    fn test_deviation_above_limit_fails_both_ways() {
        let (mut pools, pool) = pools();
        for spot in [1_101, 899] {
            pools.set_spot_tick(pool, spot).unwrap();
            let err = check_price(&pools, pool, &TwapParameters::default()).unwrap_err();
            assert!(matches!(err, EngineError::PriceProtectionTriggered { .. }));
        }
    }
}
