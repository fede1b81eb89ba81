//! Simulated markets for the compounding engine and its keeper.
//!
//! Runs the engine over in-memory collaborators, accrues fees, moves pool
//! prices and lets a [`ProfitabilityScheduler`] decide when compounding
//! pays for its gas.
//!
//! [`ProfitabilityScheduler`]: compoundor_execution::scheduler::ProfitabilityScheduler

pub mod accrual;
pub mod error;
pub mod gas;
pub mod local;
pub mod market;
pub mod prelude;
pub mod price_path;
pub mod runner;
