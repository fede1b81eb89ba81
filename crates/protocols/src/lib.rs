//! External collaborators of the compounding engine.
//!
//! This crate defines the seams the engine calls through:
//! - The position manager (collect, increase and decrease liquidity, custody transfer)
//! - Pool discovery, spot and time-weighted ticks, and swaps
//! - Token transfers out of the engine's custody
//!
//! In-memory implementations live in [`memory`] and back the simulator and tests.

/// Protocol error type.
pub mod error;
/// In-memory implementations.
pub mod memory;
/// Pool source interface.
pub mod pool;
/// Position manager interface.
pub mod position_manager;
/// Token transfer interface.
pub mod token;

pub use error::{ProtocolError, ProtocolResult};
pub use pool::PoolSource;
pub use position_manager::{
    DecreaseLiquidityParams, IncreaseLiquidityParams, IncreaseLiquidityResult, PositionManager,
};
pub use token::TokenTransport;
