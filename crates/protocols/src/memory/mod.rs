//! In-memory collaborators.
//!
//! They follow the semantics of the on-chain contracts closely enough for the
//! engine's accounting to be exercised end to end: liquidity is minted with
//! the same tick math, swaps are priced at the spot tick net of the pool fee,
//! and token custody is a plain balance map.

/// Pools with settable spot and time-weighted ticks.
pub mod pools;
/// Position manager with accruing fees.
pub mod positions;
/// Token balances of external accounts.
pub mod tokens;

pub use pools::{MemoryPools, PoolState};
pub use positions::MemoryPositionManager;
pub use tokens::MemoryTokens;
