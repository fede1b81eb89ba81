use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 20-byte account or contract address.
pub type Address = H160;

/// An account that can own positions and hold credits.
pub type AccountId = Address;

/// A fungible token contract.
pub type TokenId = Address;

/// A liquidity pool.
pub type PoolId = Address;

/// Opaque handle of a position issued by the external position primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub U256);

impl PositionId {
    /// Creates a position id from a raw value.
    pub fn new(id: impl Into<U256>) -> Self {
        Self(id.into())
    }
}

impl From<u64> for PositionId {
    fn from(v: u64) -> Self {
        Self(U256::from(v))
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
