use compoundor_domain::{AccountId, DomainError, PoolId, PositionId, TokenId};
use thiserror::Error;

/// Result alias for protocol calls.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Failures reported by the position manager, pools or token transfers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown position {0}")]
    UnknownPosition(PositionId),

    #[error("unknown pool {0:?}")]
    UnknownPool(PoolId),

    #[error("token {token:?} is not part of pool {pool:?}")]
    UnsupportedToken { pool: PoolId, token: TokenId },

    #[error("account {account:?} is not authorized for position {position}")]
    NotAuthorized {
        position: PositionId,
        account: AccountId,
    },

    #[error("slippage on {what}: minimum {minimum}, actual {actual}")]
    Slippage {
        what: &'static str,
        minimum: String,
        actual: String,
    },

    #[error("position {position} holds {available} liquidity, {requested} requested")]
    InsufficientLiquidity {
        position: PositionId,
        requested: u128,
        available: u128,
    },

    #[error("transfer of {token:?} to {to:?} rejected")]
    TransferRejected { token: TokenId, to: AccountId },

    #[error("observation window of {0}s not available")]
    ObservationUnavailable(u32),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
