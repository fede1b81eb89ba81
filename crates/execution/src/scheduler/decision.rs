//! When to check a position and when a check should compound.

use crate::config::KeeperConfig;
use crate::sync::Observation;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Why a position is checked this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckReason {
    /// The position has no observation yet.
    FirstCheck,
    /// The extrapolated gain clears the bar at the current gas price.
    EstimatedProfitable,
    /// The last check is older than the force-check interval.
    ForceCheck,
}

impl fmt::Display for CheckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstCheck => write!(f, "first check"),
            Self::EstimatedProfitable => write!(f, "estimated profitable"),
            Self::ForceCheck => write!(f, "force check"),
        }
    }
}

/// Profitability bar and staleness ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionPolicy {
    pub min_gain_cost_percent: u64,
    pub force_check_interval: Duration,
}

impl DecisionPolicy {
    pub fn new(config: &KeeperConfig) -> Self {
        Self {
            min_gain_cost_percent: config.min_gain_cost_percent,
            force_check_interval: Duration::milliseconds(
                i64::try_from(config.force_check_interval_ms).unwrap_or(i64::MAX),
            ),
        }
    }

    /// `gain * 100 >= cost * min_gain_cost_percent`, with a positive gain.
    pub fn is_ready(&self, gain: Decimal, cost: Decimal) -> bool {
        if gain <= Decimal::ZERO {
            return false;
        }
        let lhs = gain.checked_mul(Decimal::ONE_HUNDRED);
        let rhs = cost.checked_mul(Decimal::from(self.min_gain_cost_percent));
        match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => lhs >= rhs,
            // Only the gain side can be too large to represent.
            (None, _) => true,
            (Some(_), None) => false,
        }
    }

    /// Decides whether a position is due for a check.
    ///
    /// `cost_now` is the last observed gas units priced at the current gas
    /// price.
    pub fn needs_check(
        &self,
        observation: Option<&Observation>,
        now: DateTime<Utc>,
        cost_now: Decimal,
    ) -> Option<CheckReason> {
        let Some(observation) = observation else {
            return Some(CheckReason::FirstCheck);
        };

        if self.is_ready(observation.estimated_gain(now), cost_now) {
            return Some(CheckReason::EstimatedProfitable);
        }
        if now - observation.checked_at > self.force_check_interval {
            return Some(CheckReason::ForceCheck);
        }
        None
    }
}

/// Outcome of comparing a quoted bonus with the gas it costs to claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitabilityCheck {
    /// Quoted bonus in whole reference tokens.
    pub gain: Decimal,
    /// Gas cost in whole reference tokens.
    pub cost: Decimal,
    /// Gas units of the estimate.
    pub gas_units: u64,
    /// Smallest gain that would have been enough.
    pub min_required_gain: Decimal,
    pub is_profitable: bool,
}

impl ProfitabilityCheck {
    pub fn evaluate(policy: &DecisionPolicy, gain: Decimal, cost: Decimal, gas_units: u64) -> Self {
        let min_required_gain = cost
            .checked_mul(Decimal::from(policy.min_gain_cost_percent))
            .map_or(Decimal::MAX, |scaled| scaled / Decimal::ONE_HUNDRED);
        Self {
            gain,
            cost,
            gas_units,
            min_required_gain,
            is_profitable: policy.is_ready(gain, cost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn policy() -> DecisionPolicy {
        DecisionPolicy::new(&KeeperConfig::default())
    }

    #[test]
    fn test_is_ready_threshold() {
        let policy = policy();
        assert!(policy.is_ready(dec!(1.8), dec!(1)));
        assert!(!policy.is_ready(dec!(1.79), dec!(1)));
        assert!(policy.is_ready(dec!(0.0001), Decimal::ZERO));
        assert!(!policy.is_ready(Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn test_needs_check_first_and_estimated() {
        let policy = policy();
        let now = Utc::now();
        assert_eq!(policy.needs_check(None, now, dec!(1)), Some(CheckReason::FirstCheck));

        let observation = Observation {
            checked_at: now,
            gain: dec!(1),
            gas_units: 100,
            gain_per_sec: Some(dec!(0.01)),
        };
        // 1 + 0.01 * 80 = 1.8 after 80s.
        assert_eq!(policy.needs_check(Some(&observation), now + Duration::seconds(79), dec!(1)), None);
        assert_eq!(
            policy.needs_check(Some(&observation), now + Duration::seconds(80), dec!(1)),
            Some(CheckReason::EstimatedProfitable)
        );
        // A cheaper gas price makes it due earlier.
        assert_eq!(
            policy.needs_check(Some(&observation), now, dec!(0.5)),
            Some(CheckReason::EstimatedProfitable)
        );
    }

    #[test]
    fn test_force_check_bounds_staleness() {
        let policy = policy();
        let now = Utc::now();
        let observation = Observation::first(now, Decimal::ZERO, 100);

        assert_eq!(policy.needs_check(Some(&observation), now + Duration::minutes(30), dec!(1)), None);
        assert_eq!(
            policy.needs_check(
                Some(&observation),
                now + Duration::minutes(30) + Duration::milliseconds(1),
                dec!(1)
            ),
            Some(CheckReason::ForceCheck)
        );
    }

    #[test]
    fn test_profitability_check() {
        let check = ProfitabilityCheck::evaluate(&policy(), dec!(2), dec!(1), 150_000);
        assert!(check.is_profitable);
        assert_eq!(check.min_required_gain, dec!(1.8));

        let check = ProfitabilityCheck::evaluate(&policy(), dec!(1), dec!(1), 150_000);
        assert!(!check.is_profitable);
    }
}
