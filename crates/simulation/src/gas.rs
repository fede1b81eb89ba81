//! Gas estimates and a simulated gas price.

use async_trait::async_trait;
use compoundor_domain::compound::AutoCompoundParams;
use compoundor_execution::client::GasOracle;
use compoundor_execution::error::{KeeperError, KeeperResult};
use primitive_types::U256;
use rand_distr::{Distribution, LogNormal};
use std::sync::atomic::{AtomicU64, Ordering};

/// Gas units charged for an `auto_compound` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasModel {
    /// Collect, reinvest and split.
    pub base: u64,
    /// Surcharge for the rebalancing swap.
    pub swap: u64,
    /// Surcharge for converting the bonus.
    pub conversion: u64,
}

impl Default for GasModel {
    fn default() -> Self {
        Self {
            base: 180_000,
            swap: 120_000,
            conversion: 90_000,
        }
    }
}

impl GasModel {
    pub fn estimate(&self, params: &AutoCompoundParams) -> u64 {
        let mut units = self.base;
        if params.do_swap {
            units += self.swap;
        }
        if params.bonus_conversion.needs_swap() {
            units += self.conversion;
        }
        units
    }
}

/// Gas price that can be set directly and optionally jitters around it.
#[derive(Debug)]
pub struct SimulatedGasOracle {
    price: AtomicU64,
    jitter: Option<LogNormal<f64>>,
}

impl SimulatedGasOracle {
    pub fn new(price: u64) -> Self {
        Self {
            price: AtomicU64::new(price),
            jitter: None,
        }
    }

    /// Multiplies every sample by a log-normal factor with median 1.
    pub fn with_jitter(mut self, sigma: f64) -> KeeperResult<Self> {
        let jitter = LogNormal::new(0.0, sigma)
            .map_err(|e| KeeperError::InvalidConfig(format!("gas jitter: {e}")))?;
        self.jitter = Some(jitter);
        Ok(self)
    }

    pub fn set_price(&self, price: u64) {
        self.price.store(price, Ordering::SeqCst);
    }

    pub fn price(&self) -> u64 {
        self.price.load(Ordering::SeqCst)
    }

    fn sample(&self) -> u64 {
        let price = self.price();
        match &self.jitter {
            Some(jitter) => {
                let factor = jitter.sample(&mut rand::rng());
                (price as f64 * factor) as u64
            }
            None => price,
        }
    }
}

#[async_trait]
impl GasOracle for SimulatedGasOracle {
    async fn gas_price(&self) -> KeeperResult<U256> {
        Ok(U256::from(self.sample()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compoundor_domain::PositionId;
    use compoundor_domain::compound::BonusConversion;

    #[test]
    fn test_gas_model_surcharges() {
        let model = GasModel::default();
        let plain = AutoCompoundParams::new(PositionId::from(1)).with_swap(false);
        assert_eq!(model.estimate(&plain), 180_000);
        assert_eq!(model.estimate(&plain.with_swap(true)), 300_000);
        assert_eq!(
            model.estimate(&plain.with_swap(true).with_conversion(BonusConversion::Token0)),
            390_000
        );
    }

    #[tokio::test]
    async fn test_oracle_price_and_jitter() {
        let oracle = SimulatedGasOracle::new(20);
        assert_eq!(oracle.gas_price().await.unwrap(), U256::from(20u64));
        oracle.set_price(35);
        assert_eq!(oracle.gas_price().await.unwrap(), U256::from(35u64));

        let jittery = SimulatedGasOracle::new(1_000_000).with_jitter(0.1).unwrap();
        let price = jittery.gas_price().await.unwrap();
        assert!(price > U256::zero());

        assert!(SimulatedGasOracle::new(1).with_jitter(-1.0).is_err());
    }
}
