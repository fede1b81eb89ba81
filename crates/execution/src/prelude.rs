//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use compoundor_execution::prelude::*;
//! ```

// Client
pub use crate::client::{CompoundorClient, GasOracle, PoolReader, PositionTokens};

// Config
pub use crate::config::KeeperConfig;

// Emergency
pub use crate::emergency::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};

// Error
pub use crate::error::{KeeperError, KeeperResult};

// Pricing
pub use crate::pricing::ReferencePricer;

// Scheduler
pub use crate::scheduler::{
    CheckOutcome, CheckReason, CycleReport, DecisionPolicy, ProfitabilityCheck,
    ProfitabilityScheduler,
};

// Sync
pub use crate::sync::{
    CustodyListener, CustodyListenerConfig, FoldOutcome, Observation, PositionBook,
    ReconcileResult, Reconciler, TrackedPosition,
};
