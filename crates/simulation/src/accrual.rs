//! Fee accrual for custodied positions.

use crate::market::MemoryEngine;
use compoundor_domain::{PositionId, TokenAmount};
use compoundor_protocols::ProtocolResult;
use rand_distr::{Distribution, Normal};
use tracing::debug;

/// Adds fees to every custodied position each step.
#[derive(Debug, Clone)]
pub struct FeeAccrual {
    pub fee0_per_step: u128,
    pub fee1_per_step: u128,
    noise: Option<Normal<f64>>,
}

impl FeeAccrual {
    pub fn new(fee0_per_step: u128, fee1_per_step: u128) -> Self {
        Self {
            fee0_per_step,
            fee1_per_step,
            noise: None,
        }
    }

    /// Scales each step's fees by `max(0, 1 + N(0, sigma))`.
    ///
    /// A negative or non-finite `sigma` leaves accrual deterministic.
    #[must_use]
    pub fn with_noise(mut self, sigma: f64) -> Self {
        self.noise = Normal::new(0.0, sigma).ok();
        self
    }

    fn scaled(&self, amount: u128, factor: f64) -> TokenAmount {
        TokenAmount::from((amount as f64 * factor) as u128)
    }

    /// Accrues one step of fees. Returns the positions that earned fees.
    pub fn accrue(&self, engine: &mut MemoryEngine) -> ProtocolResult<Vec<PositionId>> {
        let custodied: Vec<PositionId> = engine
            .position_manager()
            .position_ids()
            .into_iter()
            .filter(|id| engine.owner_of(*id).is_some())
            .collect();

        let mut rng = rand::rng();
        for position in &custodied {
            let factor = self
                .noise
                .map_or(1.0, |noise| (1.0 + noise.sample(&mut rng)).max(0.0));
            let fee0 = self.scaled(self.fee0_per_step, factor);
            let fee1 = self.scaled(self.fee1_per_step, factor);
            engine
                .position_manager_mut()
                .accrue_fees(*position, fee0, fee1)?;
        }

        debug!(positions = custodied.len(), "Accrued fees");
        Ok(custodied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{SimulatedMarket, deposit};
    use compoundor_domain::position::TickRange;
    use compoundor_domain::{AccountId, TokenId};
    use compoundor_engine::EngineConfig;

    #[test]
    fn test_accrues_only_custodied_positions() {
        let owner = AccountId::repeat_byte(0x01);
        let mut market = SimulatedMarket::new();
        let pool = market
            .create_pool(TokenId::from_low_u64_be(1), TokenId::from_low_u64_be(2), 500, 0)
            .unwrap();
        let range = TickRange::new(-100, 100).unwrap();
        let amount = TokenAmount::from(1_000_000u64);
        let kept = market.mint(owner, pool, range, amount, amount).unwrap();
        let outside = market.mint(owner, pool, range, amount, amount).unwrap();

        let (mut engine, _admin) = market.into_engine(
            AccountId::repeat_byte(0xee),
            AccountId::repeat_byte(0x77),
            EngineConfig::default(),
        );
        deposit(&mut engine, kept, owner).unwrap();

        let accrual = FeeAccrual::new(10, 20);
        assert_eq!(accrual.accrue(&mut engine).unwrap(), vec![kept]);
        accrual.accrue(&mut engine).unwrap();

        let owed = engine.position_manager().owed(kept).unwrap();
        assert_eq!(owed, (TokenAmount::from(20u64), TokenAmount::from(40u64)));
        let untouched = engine.position_manager().owed(outside).unwrap();
        assert_eq!(untouched, (TokenAmount::zero(), TokenAmount::zero()));
    }
}
