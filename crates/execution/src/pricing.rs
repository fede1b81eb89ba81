//! Valuation of bonuses and gas costs in the reference token.

use crate::client::{PoolReader, PositionTokens};
use crate::config::KeeperConfig;
use crate::error::{KeeperError, KeeperResult};
use compoundor_domain::compound::AutoCompoundResult;
use compoundor_domain::math::tick_math::{quote_token0_in_token1, quote_token1_in_token0};
use compoundor_domain::{DomainError, PoolId, TokenAmount, TokenId};
use primitive_types::U256;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Prices tokens against a reference token through the first fee tier that
/// has a pool for the pair.
#[derive(Debug, Clone)]
pub struct ReferencePricer {
    reference_token: TokenId,
    reference_decimals: u8,
    fee_tiers: Vec<u32>,
    window_secs: u32,
    max_tick_difference: u32,
}

impl ReferencePricer {
    pub fn new(config: &KeeperConfig) -> Self {
        Self {
            reference_token: config.reference_token,
            reference_decimals: config.reference_decimals,
            fee_tiers: config.fee_tiers.clone(),
            window_secs: config.price_window_secs,
            max_tick_difference: config.max_price_tick_difference,
        }
    }

    pub fn reference_token(&self) -> TokenId {
        self.reference_token
    }

    /// Value of `amount` of `token` in raw reference token units.
    ///
    /// The reference token prices at 1. Other tokens are quoted at the
    /// pool's TWAP tick, and only while spot sits within
    /// `max_tick_difference` of it.
    pub async fn value<R: PoolReader + ?Sized>(
        &self,
        reader: &R,
        token: TokenId,
        amount: TokenAmount,
    ) -> KeeperResult<U256> {
        if token == self.reference_token || amount.is_zero() {
            return Ok(amount.as_u256());
        }

        let pool = self.reference_pool(reader, token).await?;
        let twap_tick = reader.time_weighted_tick(pool, self.window_secs).await?;
        let spot_tick = reader.spot_tick(pool).await?;
        if spot_tick.abs_diff(twap_tick) > self.max_tick_difference {
            warn!(
                pool = ?pool,
                spot_tick,
                twap_tick,
                "Reference price moved too far from its TWAP"
            );
            return Err(KeeperError::PriceProtection(format!(
                "reference pool spot tick {spot_tick} vs twap tick {twap_tick}"
            )));
        }

        let (token0, _) = reader.pool_tokens(pool).await?;
        let value = if token == token0 {
            quote_token0_in_token1(amount.as_u256(), twap_tick)?
        } else {
            quote_token1_in_token0(amount.as_u256(), twap_tick)?
        };
        Ok(value)
    }

    async fn reference_pool<R: PoolReader + ?Sized>(
        &self,
        reader: &R,
        token: TokenId,
    ) -> KeeperResult<PoolId> {
        for fee in &self.fee_tiers {
            if let Some(pool) = reader.pool_for(token, self.reference_token, *fee).await? {
                debug!(token = ?token, fee, pool = ?pool, "Found reference pool");
                return Ok(pool);
            }
        }
        Err(KeeperError::PriceUnavailable(token))
    }

    /// Value of a quoted bonus, in whole reference tokens.
    pub async fn bonus_value<R: PoolReader + ?Sized>(
        &self,
        reader: &R,
        tokens: PositionTokens,
        quote: &AutoCompoundResult,
    ) -> KeeperResult<Decimal> {
        let gain0 = self.value(reader, tokens.token0, quote.bonus0).await?;
        let gain1 = self.value(reader, tokens.token1, quote.bonus1).await?;
        let total = gain0
            .checked_add(gain1)
            .ok_or(DomainError::MathOverflow)?;
        self.to_decimal(total)
    }

    /// Cost of `gas_units` at `gas_price`, in whole reference tokens.
    pub fn gas_cost(&self, gas_price: U256, gas_units: u64) -> KeeperResult<Decimal> {
        let raw = gas_price
            .checked_mul(U256::from(gas_units))
            .ok_or(DomainError::MathOverflow)?;
        self.to_decimal(raw)
    }

    fn to_decimal(&self, raw: U256) -> KeeperResult<Decimal> {
        TokenAmount(raw)
            .to_decimal(self.reference_decimals)
            .ok_or(KeeperError::Math(DomainError::MathOverflow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockPools {
        pools: HashMap<(TokenId, TokenId, u32), PoolId>,
        tokens: HashMap<PoolId, (TokenId, TokenId)>,
        ticks: HashMap<PoolId, (i32, i32)>,
    }

    impl MockPools {
        fn add(&mut self, token0: TokenId, token1: TokenId, fee: u32, spot: i32, twap: i32) -> PoolId {
            let pool = PoolId::from_low_u64_be(0x100 + self.tokens.len() as u64);
            self.pools.insert((token0, token1, fee), pool);
            self.pools.insert((token1, token0, fee), pool);
            self.tokens.insert(pool, (token0, token1));
            self.ticks.insert(pool, (spot, twap));
            pool
        }
    }

    #[async_trait]
    impl PoolReader for MockPools {
        async fn pool_for(&self, a: TokenId, b: TokenId, fee: u32) -> KeeperResult<Option<PoolId>> {
            Ok(self.pools.get(&(a, b, fee)).copied())
        }

        async fn pool_tokens(&self, pool: PoolId) -> KeeperResult<(TokenId, TokenId)> {
            self.tokens
                .get(&pool)
                .copied()
                .ok_or_else(|| KeeperError::Transport("unknown pool".into()))
        }

        async fn spot_tick(&self, pool: PoolId) -> KeeperResult<i32> {
            Ok(self.ticks[&pool].0)
        }

        async fn time_weighted_tick(&self, pool: PoolId, _window: u32) -> KeeperResult<i32> {
            Ok(self.ticks[&pool].1)
        }
    }

    fn reference() -> TokenId {
        TokenId::from_low_u64_be(0xee)
    }

    fn pricer() -> ReferencePricer {
        ReferencePricer::new(&KeeperConfig {
            reference_token: reference(),
            reference_decimals: 6,
            ..KeeperConfig::default()
        })
    }

    #[tokio::test]
    async fn test_reference_token_prices_at_one() {
        let pools = MockPools::default();
        let value = pricer()
            .value(&pools, reference(), TokenAmount::from(1_234u64))
            .await
            .unwrap();
        assert_eq!(value, U256::from(1_234u64));
    }

    #[tokio::test]
    async fn test_walks_fee_tiers_in_order() {
        let mut pools = MockPools::default();
        let token = TokenId::from_low_u64_be(0x01);
        // Only the 3000 tier exists; token is token0, reference is token1.
        pools.add(token, reference(), 3000, 6932, 6932);

        let value = pricer()
            .value(&pools, token, TokenAmount::from(1_000_000u64))
            .await
            .unwrap();
        // 1.0001^6932 is roughly 2.
        assert!(value > U256::from(1_999_000u64) && value < U256::from(2_001_000u64));
    }

    #[tokio::test]
    async fn test_inverts_price_when_token_is_token1() {
        let mut pools = MockPools::default();
        let token = TokenId::from_low_u64_be(0xff);
        pools.add(reference(), token, 500, 6932, 6932);

        let value = pricer()
            .value(&pools, token, TokenAmount::from(2_000_000u64))
            .await
            .unwrap();
        assert!(value > U256::from(999_000u64) && value < U256::from(1_001_000u64));
    }

    #[tokio::test]
    async fn test_missing_pool_and_deviation() {
        let mut pools = MockPools::default();
        let unpriced = TokenId::from_low_u64_be(0x02);
        let result = pricer()
            .value(&pools, unpriced, TokenAmount::from(1u64))
            .await;
        assert!(matches!(result, Err(KeeperError::PriceUnavailable(t)) if t == unpriced));

        let volatile = TokenId::from_low_u64_be(0x03);
        pools.add(volatile, reference(), 100, 500, 0);
        let result = pricer()
            .value(&pools, volatile, TokenAmount::from(1u64))
            .await;
        assert!(matches!(result, Err(KeeperError::PriceProtection(_))));
    }

    #[tokio::test]
    async fn test_bonus_value_and_gas_cost() {
        let mut pools = MockPools::default();
        let token0 = TokenId::from_low_u64_be(0x01);
        pools.add(token0, reference(), 100, 0, 0);
        let tokens = PositionTokens {
            token0,
            token1: reference(),
        };
        let quote = AutoCompoundResult {
            bonus0: TokenAmount::from(1_500_000u64),
            bonus1: TokenAmount::from(500_000u64),
            ..AutoCompoundResult::default()
        };

        let pricer = pricer();
        let gain = pricer.bonus_value(&pools, tokens, &quote).await.unwrap();
        assert_eq!(gain, dec!(2));
        let cost = pricer.gas_cost(U256::from(5u64), 200_000).unwrap();
        assert_eq!(cost, dec!(1));
    }
}
