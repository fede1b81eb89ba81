//! Error types for domain math and validation.

use thiserror::Error;

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors raised by domain math and parameter validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Bonus parameters violate their bounds or the ratchet rule.
    #[error("invalid bonus: {0}")]
    InvalidBonus(&'static str),

    /// TWAP parameters are out of range.
    #[error("invalid TWAP config: {0}")]
    InvalidTwapConfig(&'static str),

    /// Tick outside the supported range.
    #[error("tick {0} out of range")]
    InvalidTick(i32),

    /// Lower tick is not strictly below the upper tick.
    #[error("invalid tick range [{lower}, {upper}]")]
    InvalidTickRange {
        /// Lower tick.
        lower: i32,
        /// Upper tick.
        upper: i32,
    },

    /// Unknown bonus conversion selector.
    #[error("invalid bonus conversion {0}")]
    InvalidBonusConversion(u8),

    /// Split amounts exceed what was available.
    #[error("conservation violated: compounded {compounded} + bonus {bonus} + protocol fee {protocol_fee} > available {available}")]
    ConservationViolated {
        /// Amount available for the split.
        available: String,
        /// Reinvested amount.
        compounded: String,
        /// Caller bonus.
        bonus: String,
        /// Protocol fee.
        protocol_fee: String,
    },

    /// Intermediate result does not fit in 256 bits.
    #[error("math overflow")]
    MathOverflow,

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
}
