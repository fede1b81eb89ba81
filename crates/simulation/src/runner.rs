//! End-to-end runs of the engine and keeper over a simulated market.

use crate::accrual::FeeAccrual;
use crate::error::{SimulationError, SimulationResult};
use crate::gas::{GasModel, SimulatedGasOracle};
use crate::local::LocalCompoundor;
use crate::market::{SimulatedMarket, deposit, move_pool};
use crate::price_path::{DeterministicTickPath, GeometricBrownianMotion, TickPathGenerator};
use chrono::{Duration, Utc};
use compoundor_domain::position::TickRange;
use compoundor_domain::{AccountId, TokenAmount, TokenId};
use compoundor_engine::EngineConfig;
use compoundor_execution::config::KeeperConfig;
use compoundor_execution::scheduler::{CycleReport, ProfitabilityScheduler};
use compoundor_execution::sync::{CustodyListener, CustodyListenerConfig, PositionBook};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;
const POOL_FEE: u32 = 3000;

/// Parameters of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of custodied positions, each with its own owner.
    pub positions: usize,
    /// Number of keeper cycles.
    pub cycles: usize,
    /// Simulated seconds between cycles.
    pub step_secs: i64,
    pub initial_tick: i32,
    /// Half width of every position's range, in ticks.
    pub range_width: i32,
    /// Amount of each token minted into every position.
    pub deposit_per_position: u128,
    /// Annualized volatility of the pool price.
    pub volatility: f64,
    /// Scripted ticks, starting with the initial tick, used instead of a
    /// random path. Must hold `cycles + 1` entries.
    pub tick_path: Option<Vec<i32>>,
    pub fee0_per_step: u128,
    pub fee1_per_step: u128,
    /// Relative noise on accrued fees.
    pub fee_noise: Option<f64>,
    /// Gas price in wei.
    pub gas_price: u64,
    /// Log-normal sigma of the sampled gas price.
    pub gas_jitter: Option<f64>,
    pub engine: EngineConfig,
    /// Keeper settings. The reference token is always the pool's token1.
    pub keeper: KeeperConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            positions: 5,
            cycles: 120,
            step_secs: 60,
            initial_tick: 0,
            range_width: 600,
            deposit_per_position: 1_000 * 10u128.pow(18),
            volatility: 0.5,
            tick_path: None,
            fee0_per_step: 5 * 10u128.pow(16),
            fee1_per_step: 5 * 10u128.pow(16),
            fee_noise: Some(0.2),
            gas_price: 20_000_000_000,
            gas_jitter: Some(0.1),
            engine: EngineConfig::default(),
            keeper: KeeperConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> SimulationResult<()> {
        if self.positions == 0 {
            return Err(SimulationError::InvalidSetup(
                "at least one position is required".to_string(),
            ));
        }
        if self.step_secs <= 0 {
            return Err(SimulationError::InvalidSetup(format!(
                "step_secs must be positive, got {}",
                self.step_secs
            )));
        }
        if self.range_width <= 0 {
            return Err(SimulationError::InvalidSetup(format!(
                "range_width must be positive, got {}",
                self.range_width
            )));
        }
        if let Some(ticks) = &self.tick_path {
            if ticks.len() != self.cycles + 1 {
                return Err(SimulationError::InvalidSetup(format!(
                    "tick_path needs {} ticks, got {}",
                    self.cycles + 1,
                    ticks.len()
                )));
            }
        }
        Ok(())
    }

    fn tick_path(&self) -> Box<dyn TickPathGenerator> {
        match &self.tick_path {
            Some(ticks) => Box::new(DeterministicTickPath {
                ticks: ticks.clone(),
            }),
            None => {
                let time_step = self.step_secs as f64 / SECONDS_PER_YEAR;
                Box::new(GeometricBrownianMotion::new(
                    self.initial_tick,
                    0.0,
                    self.volatility,
                    time_step,
                ))
            }
        }
    }
}

/// Totals of a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub cycles: usize,
    pub checked: usize,
    pub executed: usize,
    pub deferred: usize,
    pub failed: usize,
    pub skipped: usize,
    pub backed_off: usize,
    /// Positions the keeper tracked at the end.
    pub tracked: usize,
    pub token0: TokenId,
    pub token1: TokenId,
    /// Bonus credited to the keeper.
    pub keeper_balance0: TokenAmount,
    pub keeper_balance1: TokenAmount,
    /// Protocol fees credited to the treasury.
    pub treasury_balance0: TokenAmount,
    pub treasury_balance1: TokenAmount,
}

impl SimulationReport {
    fn add(&mut self, cycle: &CycleReport) {
        self.cycles += 1;
        self.checked += cycle.checked;
        self.executed += cycle.executed;
        self.deferred += cycle.deferred;
        self.failed += cycle.failed;
        self.skipped += cycle.skipped;
        self.backed_off += cycle.backed_off;
    }
}

/// Deposits `config.positions` positions into a fresh engine and lets a
/// keeper compound them while fees accrue and the price moves.
pub async fn run_simulation(config: SimulationConfig) -> SimulationResult<SimulationReport> {
    config.validate()?;

    let token0 = TokenId::from_low_u64_be(0xa0);
    let token1 = TokenId::from_low_u64_be(0xa1);
    let engine_address = AccountId::from_low_u64_be(0xc0);
    let treasury = AccountId::from_low_u64_be(0x7e);
    let keeper = AccountId::from_low_u64_be(0x6b);

    let mut market = SimulatedMarket::new();
    let pool = market.create_pool(token0, token1, POOL_FEE, config.initial_tick)?;
    let range = TickRange::new(
        config.initial_tick - config.range_width,
        config.initial_tick + config.range_width,
    )?;
    let amount = TokenAmount::from(config.deposit_per_position);

    let mut minted = Vec::with_capacity(config.positions);
    for i in 0..config.positions {
        let owner = AccountId::from_low_u64_be(0x1000 + i as u64);
        minted.push((market.mint(owner, pool, range, amount, amount)?, owner));
    }

    let (mut engine, _admin) = market.into_engine(engine_address, treasury, config.engine.clone());
    for (position, owner) in &minted {
        deposit(&mut engine, *position, *owner)?;
    }

    let client = Arc::new(LocalCompoundor::new(engine, GasModel::default()));
    let mut gas = SimulatedGasOracle::new(config.gas_price);
    if let Some(sigma) = config.gas_jitter {
        gas = gas.with_jitter(sigma)?;
    }
    let mut accrual = FeeAccrual::new(config.fee0_per_step, config.fee1_per_step);
    if let Some(sigma) = config.fee_noise {
        accrual = accrual.with_noise(sigma);
    }

    let book = Arc::new(RwLock::new(PositionBook::new()));
    let listener = Arc::new(CustodyListener::new(
        client.clone(),
        book.clone(),
        CustodyListenerConfig::default(),
    ));
    listener.sync_once().await?;
    let follower = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.start().await })
    };

    let keeper_config = KeeperConfig {
        reference_token: token1,
        ..config.keeper.clone()
    };
    let scheduler = ProfitabilityScheduler::new(
        client.clone(),
        client.clone(),
        Arc::new(gas),
        keeper,
        keeper_config,
        book.clone(),
    )?;

    let ticks = config.tick_path().generate(config.cycles);

    info!(
        positions = config.positions,
        cycles = config.cycles,
        pool = %pool,
        "Starting simulation"
    );

    let start = Utc::now();
    let mut report = SimulationReport {
        token0,
        token1,
        ..SimulationReport::default()
    };

    for (step, window) in ticks.windows(2).enumerate() {
        {
            let mut engine = client.engine().lock().await;
            // The TWAP trails the spot price by one step.
            move_pool(&mut engine, pool, window[1], window[0])?;
            accrual.accrue(&mut engine)?;
        }
        let now = start + Duration::seconds(config.step_secs * (step as i64 + 1));
        let cycle = scheduler.run_cycle(now).await?;
        report.add(&cycle);
    }

    listener.stop();
    follower.abort();

    report.tracked = book.read().await.len();
    let engine = client.engine().lock().await;
    report.keeper_balance0 = engine.account_balance(keeper, token0);
    report.keeper_balance1 = engine.account_balance(keeper, token1);
    report.treasury_balance0 = engine.account_balance(treasury, token0);
    report.treasury_balance1 = engine.account_balance(treasury, token1);

    info!(
        executed = report.executed,
        deferred = report.deferred,
        failed = report.failed,
        keeper_balance0 = %report.keeper_balance0,
        keeper_balance1 = %report.keeper_balance1,
        "Simulation finished"
    );
    Ok(report)
}
