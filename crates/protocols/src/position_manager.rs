use crate::error::ProtocolResult;
use compoundor_domain::position::PositionInfo;
use compoundor_domain::{AccountId, PositionId, TokenAmount};
use serde::{Deserialize, Serialize};

/// Arguments for adding liquidity to an existing position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncreaseLiquidityParams {
    pub position: PositionId,
    pub amount0_desired: TokenAmount,
    pub amount1_desired: TokenAmount,
    pub amount0_min: TokenAmount,
    pub amount1_min: TokenAmount,
}

/// Liquidity minted and the token amounts it consumed.
///
/// `amount0 <= amount0_desired` and `amount1 <= amount1_desired` always hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncreaseLiquidityResult {
    pub liquidity: u128,
    pub amount0: TokenAmount,
    pub amount1: TokenAmount,
}

/// Arguments for removing liquidity and collecting the proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecreaseLiquidityParams {
    pub position: PositionId,
    pub liquidity: u128,
    pub amount0_min: TokenAmount,
    pub amount1_min: TokenAmount,
}

/// The position primitive that owns liquidity and fee state.
///
/// Token amounts returned by `collect`, `decrease_liquidity_and_collect` are
/// delivered to the caller's custody; amounts consumed by
/// `increase_liquidity` leave it.
pub trait PositionManager {
    /// Metadata of a position.
    fn position(&self, id: PositionId) -> ProtocolResult<PositionInfo>;

    /// Current holder of the position.
    fn owner_of(&self, id: PositionId) -> ProtocolResult<AccountId>;

    /// Collects every uncollected fee of the position.
    fn collect(&mut self, id: PositionId) -> ProtocolResult<(TokenAmount, TokenAmount)>;

    fn increase_liquidity(
        &mut self,
        params: IncreaseLiquidityParams,
    ) -> ProtocolResult<IncreaseLiquidityResult>;

    /// Burns liquidity and collects the released amounts plus owed fees.
    fn decrease_liquidity_and_collect(
        &mut self,
        params: DecreaseLiquidityParams,
    ) -> ProtocolResult<(TokenAmount, TokenAmount)>;

    /// Moves the position from `from` to `to`.
    fn transfer_position(
        &mut self,
        id: PositionId,
        from: AccountId,
        to: AccountId,
    ) -> ProtocolResult<()>;
}
