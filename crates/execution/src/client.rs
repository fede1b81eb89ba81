//! Interfaces the keeper consumes.
//!
//! The keeper never touches engine state directly: everything goes through
//! a [`CompoundorClient`], a [`PoolReader`] for reference prices and a
//! [`GasOracle`].

use crate::error::KeeperResult;
use async_trait::async_trait;
use compoundor_domain::compound::{AutoCompoundParams, AutoCompoundResult};
use compoundor_domain::events::CustodyEvent;
use compoundor_domain::{AccountId, PoolId, PositionId, TokenId};
use primitive_types::U256;
use tokio::sync::mpsc;

/// The two tokens of a custodied position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionTokens {
    pub token0: TokenId,
    pub token1: TokenId,
}

/// Access to a compounding engine.
#[async_trait]
pub trait CompoundorClient: Send + Sync {
    /// Tokens of a custodied position.
    async fn position_tokens(&self, position: PositionId) -> KeeperResult<PositionTokens>;

    /// Dry run of `auto_compound`. Nothing is committed.
    async fn quote_auto_compound(
        &self,
        caller: AccountId,
        params: AutoCompoundParams,
    ) -> KeeperResult<AutoCompoundResult>;

    /// Gas units an `auto_compound` call is expected to use.
    async fn estimate_gas(&self, caller: AccountId, params: AutoCompoundParams) -> KeeperResult<u64>;

    /// Executes `auto_compound`.
    async fn auto_compound(
        &self,
        caller: AccountId,
        params: AutoCompoundParams,
    ) -> KeeperResult<AutoCompoundResult>;

    /// Every deposit and withdrawal so far, in any order.
    async fn custody_history(&self) -> KeeperResult<Vec<CustodyEvent>>;

    /// Live feed of deposits and withdrawals. The channel closes when the
    /// connection drops.
    async fn subscribe_custody(&self) -> KeeperResult<mpsc::Receiver<CustodyEvent>>;
}

/// Read access to pools for reference pricing.
#[async_trait]
pub trait PoolReader: Send + Sync {
    async fn pool_for(&self, token_a: TokenId, token_b: TokenId, fee: u32) -> KeeperResult<Option<PoolId>>;

    /// `(token0, token1)` of the pool.
    async fn pool_tokens(&self, pool: PoolId) -> KeeperResult<(TokenId, TokenId)>;

    async fn spot_tick(&self, pool: PoolId) -> KeeperResult<i32>;

    async fn time_weighted_tick(&self, pool: PoolId, window_seconds: u32) -> KeeperResult<i32>;
}

/// Current gas price in reference token units per gas unit.
#[async_trait]
pub trait GasOracle: Send + Sync {
    async fn gas_price(&self) -> KeeperResult<U256>;
}
