use crate::error::ProtocolResult;
use compoundor_domain::{AccountId, TokenAmount, TokenId};

/// Moves tokens out of the engine's custody.
pub trait TokenTransport {
    fn transfer(&mut self, token: TokenId, to: AccountId, amount: TokenAmount)
    -> ProtocolResult<()>;
}
