use crate::error::ProtocolResult;
use compoundor_domain::{PoolId, TokenAmount, TokenId};

/// A priced liquidity source.
pub trait PoolSource {
    /// Pool for a token pair and fee tier, in either token order.
    fn pool_for(&self, token_a: TokenId, token_b: TokenId, fee: u32) -> Option<PoolId>;

    /// `(token0, token1, fee)` of a pool.
    fn pool_tokens(&self, pool: PoolId) -> ProtocolResult<(TokenId, TokenId, u32)>;

    fn spot_tick(&self, pool: PoolId) -> ProtocolResult<i32>;

    /// Average tick over the trailing `window_seconds`.
    fn time_weighted_tick(&self, pool: PoolId, window_seconds: u32) -> ProtocolResult<i32>;

    /// Swaps an exact input through the pool.
    ///
    /// Fails with `Slippage` when the output is below `min_amount_out`.
    fn swap(
        &mut self,
        pool: PoolId,
        token_in: TokenId,
        amount_in: TokenAmount,
        min_amount_out: TokenAmount,
    ) -> ProtocolResult<TokenAmount>;
}
