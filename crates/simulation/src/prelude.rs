//! Prelude module for convenient imports.
//!
//! ```rust
//! use compoundor_simulation::prelude::*;
//! ```

pub use crate::accrual::FeeAccrual;
pub use crate::error::{SimulationError, SimulationResult};
pub use crate::gas::{GasModel, SimulatedGasOracle};
pub use crate::local::LocalCompoundor;
pub use crate::market::{MemoryEngine, SimulatedMarket, deposit, move_pool};
pub use crate::price_path::{DeterministicTickPath, GeometricBrownianMotion, TickPathGenerator};
pub use crate::runner::{SimulationConfig, SimulationReport, run_simulation};
