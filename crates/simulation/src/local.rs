//! In-process client for a simulated engine.

use crate::gas::GasModel;
use crate::market::MemoryEngine;
use async_trait::async_trait;
use compoundor_domain::compound::{AutoCompoundParams, AutoCompoundResult};
use compoundor_domain::events::CustodyEvent;
use compoundor_domain::{AccountId, PoolId, PositionId, TokenId};
use compoundor_engine::{EngineError, ErrorKind};
use compoundor_execution::client::{CompoundorClient, PoolReader, PositionTokens};
use compoundor_execution::error::{KeeperError, KeeperResult};
use compoundor_protocols::{PoolSource, PositionManager, ProtocolError};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

const CUSTODY_CHANNEL_CAPACITY: usize = 256;

/// Exposes a shared engine through the keeper's client traits.
///
/// Quotes and gas estimates run against a snapshot of the engine, the way
/// a node answers a static call. Every call holds the engine lock for its
/// whole duration, so executions on the same position are serialized.
#[derive(Clone)]
pub struct LocalCompoundor {
    engine: Arc<Mutex<MemoryEngine>>,
    gas_model: GasModel,
}

impl LocalCompoundor {
    pub fn new(engine: MemoryEngine, gas_model: GasModel) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            gas_model,
        }
    }

    /// The shared engine, e.g. to accrue fees or move prices between cycles.
    pub fn engine(&self) -> &Arc<Mutex<MemoryEngine>> {
        &self.engine
    }
}

fn engine_error(err: EngineError) -> KeeperError {
    match err.kind() {
        ErrorKind::Protection => KeeperError::PriceProtection(err.to_string()),
        ErrorKind::ExternalDependency => KeeperError::External(err.to_string()),
        ErrorKind::Validation | ErrorKind::Internal => KeeperError::Rejected(err.to_string()),
    }
}

fn pool_error(err: ProtocolError) -> KeeperError {
    KeeperError::Transport(err.to_string())
}

#[async_trait]
impl CompoundorClient for LocalCompoundor {
    async fn position_tokens(&self, position: PositionId) -> KeeperResult<PositionTokens> {
        let engine = self.engine.lock().await;
        if engine.owner_of(position).is_none() {
            return Err(engine_error(EngineError::PositionNotCustodied(position)));
        }
        let info = engine
            .position_manager()
            .position(position)
            .map_err(|e| engine_error(e.into()))?;
        Ok(PositionTokens {
            token0: info.token0,
            token1: info.token1,
        })
    }

    async fn quote_auto_compound(
        &self,
        caller: AccountId,
        params: AutoCompoundParams,
    ) -> KeeperResult<AutoCompoundResult> {
        self.engine
            .lock()
            .await
            .preview_auto_compound(caller, params)
            .map_err(engine_error)
    }

    async fn estimate_gas(&self, caller: AccountId, params: AutoCompoundParams) -> KeeperResult<u64> {
        // A call that would fail cannot be estimated.
        self.engine
            .lock()
            .await
            .preview_auto_compound(caller, params)
            .map_err(engine_error)?;
        Ok(self.gas_model.estimate(&params))
    }

    async fn auto_compound(
        &self,
        caller: AccountId,
        params: AutoCompoundParams,
    ) -> KeeperResult<AutoCompoundResult> {
        self.engine
            .lock()
            .await
            .auto_compound(caller, params)
            .map_err(engine_error)
    }

    async fn custody_history(&self) -> KeeperResult<Vec<CustodyEvent>> {
        Ok(self.engine.lock().await.custody_history())
    }

    async fn subscribe_custody(&self) -> KeeperResult<mpsc::Receiver<CustodyEvent>> {
        let mut events = self.engine.lock().await.subscribe();
        let (tx, rx) = mpsc::channel(CUSTODY_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(custody) = event.custody_event() else {
                            continue;
                        };
                        if tx.send(custody).await.is_err() {
                            debug!("Custody subscriber went away");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // Closing the feed makes the subscriber reconcile.
                        warn!(missed, "Custody feed lagged, closing subscription");
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl PoolReader for LocalCompoundor {
    async fn pool_for(&self, token_a: TokenId, token_b: TokenId, fee: u32) -> KeeperResult<Option<PoolId>> {
        Ok(self.engine.lock().await.pool_source().pool_for(token_a, token_b, fee))
    }

    async fn pool_tokens(&self, pool: PoolId) -> KeeperResult<(TokenId, TokenId)> {
        let (token0, token1, _) = self
            .engine
            .lock()
            .await
            .pool_source()
            .pool_tokens(pool)
            .map_err(pool_error)?;
        Ok((token0, token1))
    }

    async fn spot_tick(&self, pool: PoolId) -> KeeperResult<i32> {
        self.engine
            .lock()
            .await
            .pool_source()
            .spot_tick(pool)
            .map_err(pool_error)
    }

    async fn time_weighted_tick(&self, pool: PoolId, window_seconds: u32) -> KeeperResult<i32> {
        self.engine
            .lock()
            .await
            .pool_source()
            .time_weighted_tick(pool, window_seconds)
            .map_err(pool_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{SimulatedMarket, deposit, move_pool};
    use compoundor_domain::TokenAmount;
    use compoundor_domain::position::TickRange;
    use compoundor_engine::EngineConfig;

    struct Setup {
        client: LocalCompoundor,
        position: PositionId,
        pool: PoolId,
        owner: AccountId,
    }

    fn setup() -> Setup {
        let owner = AccountId::repeat_byte(0x01);
        let mut market = SimulatedMarket::new();
        let pool = market
            .create_pool(TokenId::from_low_u64_be(0xa0), TokenId::from_low_u64_be(0xa1), 3000, 0)
            .unwrap();
        let position = market
            .mint(
                owner,
                pool,
                TickRange::new(-600, 600).unwrap(),
                TokenAmount::from(1_000_000_000u64),
                TokenAmount::from(1_000_000_000u64),
            )
            .unwrap();
        let (mut engine, _admin) = market.into_engine(
            AccountId::repeat_byte(0xee),
            AccountId::repeat_byte(0x77),
            EngineConfig::default(),
        );
        deposit(&mut engine, position, owner).unwrap();
        Setup {
            client: LocalCompoundor::new(engine, GasModel::default()),
            position,
            pool,
            owner,
        }
    }

    #[tokio::test]
    async fn test_quote_does_not_commit() {
        let s = setup();
        let keeper = AccountId::repeat_byte(0x02);
        s.client
            .engine()
            .lock()
            .await
            .position_manager_mut()
            .accrue_fees(s.position, TokenAmount::from(1_000_000u64), TokenAmount::from(1_000_000u64))
            .unwrap();

        let params = AutoCompoundParams::new(s.position).with_swap(true);
        let quote = s.client.quote_auto_compound(keeper, params).await.unwrap();
        assert!(!quote.bonus0.is_zero());
        assert_eq!(s.client.estimate_gas(keeper, params).await.unwrap(), 300_000);

        let executed = s.client.auto_compound(keeper, params).await.unwrap();
        assert_eq!(executed, quote);
        let again = s.client.quote_auto_compound(keeper, params).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_errors_are_classified() {
        let s = setup();
        let keeper = AccountId::repeat_byte(0x02);

        let err = s
            .client
            .auto_compound(keeper, AutoCompoundParams::new(PositionId::from(99)))
            .await
            .unwrap_err();
        assert!(matches!(err, KeeperError::Rejected(_)));

        move_pool(&mut *s.client.engine().lock().await, s.pool, 500, 0).unwrap();
        let err = s
            .client
            .quote_auto_compound(keeper, AutoCompoundParams::new(s.position).with_swap(true))
            .await
            .unwrap_err();
        assert!(matches!(err, KeeperError::PriceProtection(_)));
    }

    #[tokio::test]
    async fn test_custody_feed_forwards_withdrawals() {
        let s = setup();
        let mut feed = s.client.subscribe_custody().await.unwrap();

        s.client
            .engine()
            .lock()
            .await
            .withdraw_token(s.owner, s.position, s.owner, false, TokenAmount::zero())
            .unwrap();

        let event = feed.recv().await.unwrap();
        assert_eq!(event.position, s.position);
        assert_eq!(
            event.kind,
            compoundor_domain::events::CustodyEventKind::Withdrawn
        );
        assert_eq!(s.client.custody_history().await.unwrap().len(), 2);
    }
}
