//! Versioned bonus and TWAP configuration.
//!
//! Configuration is an explicit value owned by the engine. Changes go through
//! [`EngineConfig::with_bonus`] and [`EngineConfig::with_twap`], which validate
//! the new values and bump `version`; the engine only accepts them from the
//! holder of its [`AdminCap`].

use crate::error::EngineResult;
use compoundor_domain::math::X64;
use compoundor_domain::parameters::{BonusParameters, TwapParameters};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_engine_id() -> u64 {
    NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Capability to change the configuration of one engine instance.
///
/// Minted once by the engine constructor and not clonable.
#[derive(Debug, PartialEq, Eq)]
pub struct AdminCap {
    engine_id: u64,
}

impl AdminCap {
    pub(crate) fn new(engine_id: u64) -> Self {
        Self { engine_id }
    }

    pub(crate) fn engine_id(&self) -> u64 {
        self.engine_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Incremented on every accepted change.
    pub version: u64,
    pub bonus: BonusParameters,
    pub twap: TwapParameters,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: 0,
            bonus: BonusParameters::default(),
            twap: TwapParameters::default(),
        }
    }
}

impl EngineConfig {
    /// Builds an initial configuration, checking the static bonus bounds.
    pub fn new(bonus: BonusParameters, twap: TwapParameters) -> EngineResult<Self> {
        let bonus = BonusParameters::new(bonus.total_bonus_x64, bonus.compounder_bonus_x64)?;
        let twap = TwapParameters::new(twap.max_tick_difference, twap.window_seconds)?;
        Ok(Self {
            version: 0,
            bonus,
            twap,
        })
    }

    /// Next configuration with new bonus fractions.
    ///
    /// Fails unless `compounder <= total <= MAX_BONUS_X64` and `total` does
    /// not exceed the current total.
    pub fn with_bonus(&self, total_bonus_x64: X64, compounder_bonus_x64: X64) -> EngineResult<Self> {
        let next = BonusParameters::new(total_bonus_x64, compounder_bonus_x64)?;
        self.bonus.validate_update(&next)?;
        Ok(Self {
            version: self.version + 1,
            bonus: next,
            twap: self.twap,
        })
    }

    /// Next configuration with new TWAP settings.
    pub fn with_twap(&self, max_tick_difference: u32, window_seconds: u32) -> EngineResult<Self> {
        let twap = TwapParameters::new(max_tick_difference, window_seconds)?;
        Ok(Self {
            version: self.version + 1,
            bonus: self.bonus,
            twap,
        })
    }
}
