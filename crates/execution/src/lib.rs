//! Off-chain profitability keeper for the auto-compounder.
//!
//! This crate provides the scheduler that decides when compounding a
//! custodied position pays for its gas:
//! - Client traits for the engine, pools and gas price
//! - Position tracking from custody events, with reconciliation
//! - Reference pricing of bonuses and gas costs
//! - The check cycle with rate extrapolation and a force-check ceiling
//! - Per-position back-off

/// Prelude module for convenient imports.
pub mod prelude;

/// Client traits for the engine, pools and gas oracle.
pub mod client;
/// Keeper configuration.
pub mod config;
/// Per-position circuit breaker.
pub mod emergency;
/// Keeper error type.
pub mod error;
/// Reference token valuation.
pub mod pricing;
/// The profitability scheduler.
pub mod scheduler;
/// Custody tracking and reconciliation.
pub mod sync;
