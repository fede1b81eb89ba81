//! Profitability scheduler.
//!
//! Every cycle the scheduler walks the tracked positions and, for each one
//! that is due, quotes the caller bonus of an `auto_compound`, prices it
//! against the gas the call would burn and compounds when the bonus clears
//! the configured bar. Positions that are not yet worth it keep an
//! observation from which the next due time is extrapolated.

mod decision;

pub use decision::*;

use crate::client::{CompoundorClient, GasOracle, PoolReader};
use crate::config::KeeperConfig;
use crate::emergency::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::{KeeperError, KeeperResult};
use crate::pricing::ReferencePricer;
use crate::sync::{Observation, PositionBook, TrackedPosition};
use chrono::{DateTime, Utc};
use compoundor_domain::compound::{AutoCompoundParams, AutoCompoundResult};
use compoundor_domain::{AccountId, PositionId};
use primitive_types::U256;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Counters of one check cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Positions quoted this cycle.
    pub checked: usize,
    /// Positions compounded.
    pub executed: usize,
    /// Positions quoted but not worth compounding yet.
    pub deferred: usize,
    /// Positions whose check failed.
    pub failed: usize,
    /// Positions not due.
    pub skipped: usize,
    /// Positions sitting out a back-off.
    pub backed_off: usize,
}

/// What a check of one position did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Executed {
        check: ProfitabilityCheck,
        result: AutoCompoundResult,
    },
    Deferred(ProfitabilityCheck),
}

/// Drives `auto_compound` for custodied positions when it pays off.
pub struct ProfitabilityScheduler<C: ?Sized, R: ?Sized, G: ?Sized> {
    client: Arc<C>,
    pools: Arc<R>,
    gas: Arc<G>,
    keeper: AccountId,
    config: KeeperConfig,
    policy: DecisionPolicy,
    pricer: ReferencePricer,
    book: Arc<RwLock<PositionBook>>,
    breaker: CircuitBreaker,
    cycle_lock: Mutex<()>,
    running: AtomicBool,
}

impl<C, R, G> ProfitabilityScheduler<C, R, G>
where
    C: CompoundorClient + ?Sized,
    R: PoolReader + ?Sized,
    G: GasOracle + ?Sized,
{
    /// Creates a scheduler acting as `keeper` on the positions in `book`.
    pub fn new(
        client: Arc<C>,
        pools: Arc<R>,
        gas: Arc<G>,
        keeper: AccountId,
        config: KeeperConfig,
        book: Arc<RwLock<PositionBook>>,
    ) -> KeeperResult<Self> {
        config.validate()?;
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            backoff_ms: config.backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        });
        Ok(Self {
            client,
            pools,
            gas,
            keeper,
            policy: DecisionPolicy::new(&config),
            pricer: ReferencePricer::new(&config),
            config,
            book,
            breaker,
            cycle_lock: Mutex::new(()),
            running: AtomicBool::new(false),
        })
    }

    pub fn book(&self) -> &Arc<RwLock<PositionBook>> {
        &self.book
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    /// Runs check cycles until stopped.
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        let mut ticker = interval(self.config.check_interval());

        info!(
            interval_ms = self.config.check_interval_ms,
            force_check_interval_ms = self.config.force_check_interval_ms,
            min_gain_cost_percent = self.config.min_gain_cost_percent,
            "Starting profitability scheduler"
        );

        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if let Err(e) = self.run_cycle(Utc::now()).await {
                error!(error = %e, "Check cycle failed");
            }
        }

        info!("Profitability scheduler stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs one check cycle as of `now`.
    ///
    /// Cycles never overlap, so two attempts on the same position always
    /// see each other's result.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> KeeperResult<CycleReport> {
        let _cycle = self.cycle_lock.lock().await;
        let positions = self.book.read().await.positions();
        let gas_price = self.timed("gas_price", self.gas.gas_price()).await?;

        debug!(count = positions.len(), gas_price = %gas_price, "Checking positions");
        let mut report = CycleReport::default();

        for tracked in positions {
            let position = tracked.position;
            if !self.breaker.is_allowed(position, now).await {
                report.backed_off += 1;
                continue;
            }

            let reason = match self.due(&tracked, gas_price, now) {
                Ok(Some(reason)) => reason,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    self.handle_failure(position, &e, now).await;
                    continue;
                }
            };

            report.checked += 1;
            match self.check_position(position, reason, now).await {
                Ok(CheckOutcome::Executed { .. }) => {
                    report.executed += 1;
                    self.breaker.record_success(position).await;
                }
                Ok(CheckOutcome::Deferred(_)) => {
                    report.deferred += 1;
                    self.breaker.record_success(position).await;
                }
                Err(e) => {
                    report.failed += 1;
                    self.handle_failure(position, &e, now).await;
                }
            }
        }

        info!(
            checked = report.checked,
            executed = report.executed,
            deferred = report.deferred,
            failed = report.failed,
            skipped = report.skipped,
            backed_off = report.backed_off,
            "Check cycle finished"
        );
        Ok(report)
    }

    fn due(
        &self,
        tracked: &TrackedPosition,
        gas_price: U256,
        now: DateTime<Utc>,
    ) -> KeeperResult<Option<CheckReason>> {
        let cost_now = match &tracked.observation {
            Some(observation) => self.pricer.gas_cost(gas_price, observation.gas_units)?,
            None => Decimal::ZERO,
        };
        Ok(self
            .policy
            .needs_check(tracked.observation.as_ref(), now, cost_now))
    }

    /// Quotes a position and compounds it if the bonus pays for the gas.
    pub async fn check_position(
        &self,
        position: PositionId,
        reason: CheckReason,
        now: DateTime<Utc>,
    ) -> KeeperResult<CheckOutcome> {
        let previous = self
            .book
            .read()
            .await
            .get(position)
            .ok_or(KeeperError::NotTracked(position))?
            .observation;
        let params = self.params(position);

        let quote = self
            .timed("quote_auto_compound", self.client.quote_auto_compound(self.keeper, params))
            .await?;
        let gas_units = self
            .timed("estimate_gas", self.client.estimate_gas(self.keeper, params))
            .await?;
        let tokens = self
            .timed("position_tokens", self.client.position_tokens(position))
            .await?;
        let gain = self.pricer.bonus_value(self.pools.as_ref(), tokens, &quote).await?;

        // The price seen at the start of the cycle may be stale by now.
        let gas_price = self.timed("gas_price", self.gas.gas_price()).await?;
        let cost = self.pricer.gas_cost(gas_price, gas_units)?;
        let check = ProfitabilityCheck::evaluate(&self.policy, gain, cost, gas_units);

        debug!(
            position = %position,
            reason = %reason,
            gain = %check.gain,
            cost = %check.cost,
            min_required_gain = %check.min_required_gain,
            "Checked position"
        );

        if !check.is_profitable {
            let observation = match previous {
                Some(previous) => previous.next(now, gain, gas_units),
                None => Observation::first(now, gain, gas_units),
            };
            self.book
                .write()
                .await
                .set_observation(position, Some(observation));
            return Ok(CheckOutcome::Deferred(check));
        }

        match self
            .timed("auto_compound", self.client.auto_compound(self.keeper, params))
            .await
        {
            Ok(result) => {
                let observation = match previous {
                    Some(previous) => previous.compounded(now, gas_units),
                    None => Observation::first(now, Decimal::ZERO, gas_units),
                };
                self.book
                    .write()
                    .await
                    .set_observation(position, Some(observation));
                info!(
                    position = %position,
                    bonus0 = %result.bonus0,
                    bonus1 = %result.bonus1,
                    compounded0 = %result.compounded0,
                    compounded1 = %result.compounded1,
                    gain = %check.gain,
                    cost = %check.cost,
                    "Auto-compounded position"
                );
                Ok(CheckOutcome::Executed { check, result })
            }
            Err(e @ KeeperError::Timeout { .. }) => {
                // Unknown outcome: start the position over.
                self.book.write().await.set_observation(position, None);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn handle_failure(&self, position: PositionId, error: &KeeperError, now: DateTime<Utc>) {
        if error.should_back_off() {
            self.breaker
                .record_failure(position, now, &error.to_string())
                .await;
        } else {
            warn!(position = %position, error = %error, "Position check failed");
        }
    }

    fn params(&self, position: PositionId) -> AutoCompoundParams {
        AutoCompoundParams::new(position)
            .with_conversion(self.config.bonus_conversion)
            .with_withdraw_bonus(self.config.withdraw_bonus)
            .with_swap(self.config.do_swap)
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = KeeperResult<T>>,
    ) -> KeeperResult<T> {
        match tokio::time::timeout(self.config.call_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(KeeperError::Timeout {
                operation,
                millis: self.config.call_timeout_ms,
            }),
        }
    }
}
