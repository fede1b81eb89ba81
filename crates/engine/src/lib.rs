//! Custodial auto-compounding engine.
//!
//! This crate provides the on-ledger half of the compounder:
//! - Custody of deposited positions and the owner index
//! - Per-account token credits backed by the tokens the engine holds
//! - Versioned bonus and TWAP configuration behind an admin capability
//! - The TWAP price guard and swap planning
//! - `auto_compound`: collect, rebalance, reinvest and split, all or nothing

/// Versioned engine configuration and the admin capability.
pub mod config;
/// Position custody registry.
pub mod custody;
/// The compounding engine.
pub mod engine;
/// Engine error type.
pub mod error;
/// Engine events.
pub mod events;
/// Per-account token credits.
pub mod ledger;
/// Rebalancing and conversion swaps.
pub mod swap;
/// TWAP price guard.
pub mod twap_guard;

pub use config::{AdminCap, EngineConfig};
pub use custody::CustodyRegistry;
pub use engine::{CompoundingEngine, DepositReceipt};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use events::{EngineEvent, EngineEventKind};
pub use ledger::BalanceLedger;
