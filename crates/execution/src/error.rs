//! Keeper error type.

use compoundor_domain::{DomainError, PositionId, TokenId};
use thiserror::Error;

/// Result alias for keeper operations.
pub type KeeperResult<T> = Result<T, KeeperError>;

/// Errors surfaced while checking or compounding a position.
#[derive(Debug, Clone, Error)]
pub enum KeeperError {
    /// The engine's TWAP guard refused the call.
    #[error("price protection: {0}")]
    PriceProtection(String),

    /// The engine rejected the request itself, e.g. an uncustodied position.
    #[error("rejected by engine: {0}")]
    Rejected(String),

    /// A collaborator of the engine failed, e.g. a slippage bound.
    #[error("external failure: {0}")]
    External(String),

    /// The connection to the engine failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A call did not finish in time. Its outcome is unknown.
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// Name of the call.
        operation: &'static str,
        /// Timeout that elapsed.
        millis: u64,
    },

    /// No fee tier has a pool pricing the token in the reference token.
    #[error("no reference price for token {0:?}")]
    PriceUnavailable(TokenId),

    /// The position is not tracked by the keeper.
    #[error("position {0} is not tracked")]
    NotTracked(PositionId),

    /// Keeper configuration is invalid.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Valuation math failed.
    #[error(transparent)]
    Math(#[from] DomainError),
}

impl KeeperError {
    /// Whether the position should sit out for a while before the next try.
    ///
    /// Protection errors clear once the price settles back inside the
    /// window; transport and external failures are retried later. A
    /// rejection means the keeper's view is wrong and is fixed by
    /// reconciliation instead.
    pub fn should_back_off(&self) -> bool {
        matches!(
            self,
            Self::PriceProtection(_) | Self::External(_) | Self::Transport(_) | Self::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_off_classification() {
        assert!(KeeperError::PriceProtection("spot far from twap".into()).should_back_off());
        assert!(
            KeeperError::Timeout {
                operation: "auto_compound",
                millis: 100
            }
            .should_back_off()
        );
        assert!(!KeeperError::Rejected("not custodied".into()).should_back_off());
        assert!(!KeeperError::InvalidConfig("zero interval".into()).should_back_off());
    }
}
