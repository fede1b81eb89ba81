use compoundor_domain::{AccountId, DomainError, PositionId, TokenAmount, TokenId};
use compoundor_protocols::ProtocolError;
use thiserror::Error;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// How a failure should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input. Rejected before any mutation; retry with corrected input.
    Validation,
    /// Price guard tripped. Usually transient; back off and retry.
    Protection,
    /// A collaborator failed. Propagated unmodified.
    ExternalDependency,
    /// An accounting invariant broke. Never expected.
    Internal,
}

/// Errors returned by the compounding engine.
///
/// Every error leaves engine state exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("position {0} is not custodied")]
    PositionNotCustodied(PositionId),

    #[error("position {0} is already custodied")]
    AlreadyCustodied(PositionId),

    #[error("position {0} was not transferred to the engine")]
    PositionNotDelivered(PositionId),

    #[error("{caller:?} is not the owner of position {position}")]
    NotOwner {
        position: PositionId,
        caller: AccountId,
    },

    #[error("insufficient balance of {token:?} for {account:?}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        token: TokenId,
        requested: TokenAmount,
        available: TokenAmount,
    },

    #[error("invalid bonus: {0}")]
    InvalidBonus(&'static str),

    #[error("invalid TWAP config: {0}")]
    InvalidTwapConfig(&'static str),

    #[error("capability does not belong to this engine")]
    Unauthorized,

    #[error("no pool for {token0:?}/{token1:?} at fee {fee}")]
    PoolNotFound {
        token0: TokenId,
        token1: TokenId,
        fee: u32,
    },

    #[error("price protection triggered: spot tick {spot_tick}, twap tick {twap_tick}, max difference {max_tick_difference}")]
    PriceProtectionTriggered {
        spot_tick: i32,
        twap_tick: i32,
        max_tick_difference: u32,
    },

    #[error("ledger invariant violated for {token:?}: credits {credited} exceed held {held}")]
    LedgerInvariantViolated {
        token: TokenId,
        credited: TokenAmount,
        held: TokenAmount,
    },

    #[error("math error: {0}")]
    Math(DomainError),

    #[error(transparent)]
    External(#[from] ProtocolError),
}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidBonus(reason) => Self::InvalidBonus(reason),
            DomainError::InvalidTwapConfig(reason) => Self::InvalidTwapConfig(reason),
            other => Self::Math(other),
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PositionNotCustodied(_)
            | Self::AlreadyCustodied(_)
            | Self::PositionNotDelivered(_)
            | Self::NotOwner { .. }
            | Self::InsufficientBalance { .. }
            | Self::InvalidBonus(_)
            | Self::InvalidTwapConfig(_)
            | Self::Unauthorized
            | Self::PoolNotFound { .. } => ErrorKind::Validation,
            Self::Math(DomainError::InvalidBonusConversion(_)) => ErrorKind::Validation,
            Self::PriceProtectionTriggered { .. } => ErrorKind::Protection,
            Self::External(_) => ErrorKind::ExternalDependency,
            Self::LedgerInvariantViolated { .. } | Self::Math(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying later without changing the input may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Protection | ErrorKind::ExternalDependency
        )
    }
}
