//! Domain model for the concentrated liquidity auto-compounder.
//!
//! This crate holds the value types shared by the custodial engine and the
//! off-chain keeper:
//! - Account, token and position identifiers
//! - Token amounts and X64 fixed-point fractions
//! - Tick and concentrated liquidity math
//! - Bonus and TWAP parameters
//! - The auto-compound call contract and custody events

/// The auto-compound call contract.
pub mod compound;
/// Domain errors.
pub mod error;
/// Custody events.
pub mod events;
/// Fee split math.
pub mod fees;
/// Account, token and position identifiers.
pub mod ids;
/// Fixed-point, tick and liquidity math.
pub mod math;
/// Engine parameters.
pub mod parameters;
/// Position metadata.
pub mod position;
/// Token amounts.
pub mod token;

pub use error::{DomainError, DomainResult};
pub use ids::{AccountId, Address, PoolId, PositionId, TokenId};
pub use token::TokenAmount;
