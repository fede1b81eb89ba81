//! Tick paths that move simulated pools.

use compoundor_domain::math::tick_math::clamp_tick;
use rand_distr::{Distribution, Normal};

pub trait TickPathGenerator {
    /// Returns `steps + 1` ticks, starting with the initial tick.
    fn generate(&mut self, steps: usize) -> Vec<i32>;
}

/// Geometric Brownian motion of the pool price, expressed in ticks.
pub struct GeometricBrownianMotion {
    pub initial_tick: i32,
    pub drift: f64,      // annualized drift (mu)
    pub volatility: f64, // annualized volatility (sigma)
    pub time_step: f64,  // time step in years (dt)
}

impl GeometricBrownianMotion {
    pub fn new(initial_tick: i32, drift: f64, volatility: f64, time_step: f64) -> Self {
        Self {
            initial_tick,
            drift,
            volatility,
            time_step,
        }
    }
}

impl TickPathGenerator for GeometricBrownianMotion {
    fn generate(&mut self, steps: usize) -> Vec<i32> {
        let mut ticks = Vec::with_capacity(steps + 1);
        ticks.push(self.initial_tick);

        let dt = self.time_step;
        let drift_term = (self.drift - 0.5 * self.volatility.powi(2)) * dt;
        let vol_term = self.volatility * dt.sqrt();
        let Ok(normal) = Normal::new(0.0, 1.0) else {
            return ticks;
        };

        // ln(price) = tick * ln(1.0001), so a log return maps to a tick delta.
        let ticks_per_log_unit = 1.0 / 1.0001f64.ln();
        let mut rng = rand::rng();
        let mut log_tick = f64::from(self.initial_tick);

        for _ in 0..steps {
            let z = normal.sample(&mut rng);
            log_tick += (drift_term + vol_term * z) * ticks_per_log_unit;
            ticks.push(clamp_tick(log_tick.round() as i64));
        }

        ticks
    }
}

pub struct DeterministicTickPath {
    pub ticks: Vec<i32>,
}

impl TickPathGenerator for DeterministicTickPath {
    fn generate(&mut self, _steps: usize) -> Vec<i32> {
        self.ticks.clone()
    }
}
