//! Keeper configuration.

use crate::error::{KeeperError, KeeperResult};
use compoundor_domain::TokenId;
use compoundor_domain::compound::BonusConversion;
use compoundor_domain::position::FEE_TIERS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the profitability keeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// Interval between check cycles in milliseconds.
    pub check_interval_ms: u64,
    /// A position is checked at least this often, whatever its estimate says.
    pub force_check_interval_ms: u64,
    /// Required gain as a percentage of the gas cost.
    pub min_gain_cost_percent: u64,
    /// Token every gain and cost is valued in.
    pub reference_token: TokenId,
    /// Decimals of the reference token.
    pub reference_decimals: u8,
    /// Fee tiers searched for a pool against the reference token.
    pub fee_tiers: Vec<u32>,
    /// TWAP window used for reference prices.
    pub price_window_secs: u32,
    /// Largest spot/TWAP gap accepted for a reference price.
    pub max_price_tick_difference: u32,
    /// Timeout for each call to the engine in milliseconds.
    pub call_timeout_ms: u64,
    /// Bonus conversion passed to `auto_compound`.
    pub bonus_conversion: BonusConversion,
    /// Whether the engine should rebalance before reinvesting.
    pub do_swap: bool,
    /// Whether the bonus is paid out instead of credited.
    pub withdraw_bonus: bool,
    /// First back-off after a failed check in milliseconds.
    pub backoff_ms: u64,
    /// Back-off ceiling in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 5_000,
            force_check_interval_ms: 30 * 60 * 1_000,
            min_gain_cost_percent: 180,
            reference_token: TokenId::zero(),
            reference_decimals: 18,
            fee_tiers: FEE_TIERS.to_vec(),
            price_window_secs: 60,
            max_price_tick_difference: 100,
            call_timeout_ms: 30_000,
            bonus_conversion: BonusConversion::None,
            do_swap: true,
            withdraw_bonus: false,
            backoff_ms: 60_000,
            max_backoff_ms: 15 * 60 * 1_000,
        }
    }
}

impl KeeperConfig {
    /// Parses and validates a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> KeeperResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the config for values the keeper cannot run with.
    pub fn validate(&self) -> KeeperResult<()> {
        if self.check_interval_ms == 0 {
            return Err(KeeperError::InvalidConfig(
                "check_interval_ms must be positive".into(),
            ));
        }
        if self.force_check_interval_ms < self.check_interval_ms {
            return Err(KeeperError::InvalidConfig(
                "force_check_interval_ms must not be shorter than check_interval_ms".into(),
            ));
        }
        if self.min_gain_cost_percent == 0 {
            return Err(KeeperError::InvalidConfig(
                "min_gain_cost_percent must be positive".into(),
            ));
        }
        if self.fee_tiers.is_empty() {
            return Err(KeeperError::InvalidConfig("fee_tiers is empty".into()));
        }
        if self.price_window_secs == 0 {
            return Err(KeeperError::InvalidConfig(
                "price_window_secs must be positive".into(),
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err(KeeperError::InvalidConfig(
                "call_timeout_ms must be positive".into(),
            ));
        }
        if self.backoff_ms > self.max_backoff_ms {
            return Err(KeeperError::InvalidConfig(
                "backoff_ms exceeds max_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeper_config_default() {
        let config = KeeperConfig::default();
        assert_eq!(config.check_interval_ms, 5_000);
        assert_eq!(config.force_check_interval_ms, 1_800_000);
        assert_eq!(config.min_gain_cost_percent, 180);
        assert_eq!(config.fee_tiers, vec![100, 500, 3000, 10000]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = KeeperConfig::from_json(
            r#"{ "min_gain_cost_percent": 250, "bonus_conversion": "Token1" }"#,
        )
        .unwrap();
        assert_eq!(config.min_gain_cost_percent, 250);
        assert_eq!(config.bonus_conversion, BonusConversion::Token1);
        assert_eq!(config.check_interval_ms, 5_000);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(matches!(
            KeeperConfig::from_json(r#"{ "check_interval_ms": 0 }"#),
            Err(KeeperError::InvalidConfig(_))
        ));
        assert!(matches!(
            KeeperConfig::from_json(r#"{ "backoff_ms": 10, "max_backoff_ms": 5 }"#),
            Err(KeeperError::InvalidConfig(_))
        ));
        assert!(KeeperConfig::from_json("not json").is_err());
    }
}
